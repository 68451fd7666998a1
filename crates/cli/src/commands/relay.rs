//! `staticip ip` and `staticip proxy`.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use proxy::{HttpMethod, Transport};
use relay::{RelayClient, RelayOptions};

/// Arguments of `staticip proxy`.
#[derive(Args, Debug)]
pub struct ProxyArgs {
    /// Target URL the proxy should call
    pub url: String,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD)
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: HttpMethod,

    /// Extra header for the target, as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// JSON request body
    #[arg(long, value_name = "BODY")]
    pub json: Option<String>,
}

/// Returns the proxy's outbound IP.
pub async fn ip<T: Transport>(relay: &RelayClient<T>) -> Result<String> {
    relay
        .static_ip()
        .await
        .context("failed to read the proxy's static IP")
}

/// Relays one request and returns the pretty-printed JSON reply.
pub async fn proxy<T: Transport>(relay: &RelayClient<T>, args: ProxyArgs) -> Result<String> {
    let mut options = RelayOptions::new();
    for header in &args.headers {
        let (name, value) = parse_header(header)?;
        options = options.header(name, value);
    }
    if let Some(body) = &args.json {
        let value = serde_json::from_str(body).context("--json is not valid JSON")?;
        options = options.json(value);
    }

    let reply = relay
        .proxy_request(&args.url, args.method, options)
        .await
        .with_context(|| format!("{} {} through the proxy failed", args.method, args.url))?;
    Ok(serde_json::to_string_pretty(&reply)?)
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header '{raw}' must look like 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header '{raw}' has an empty name"));
    }
    Ok((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proxy::testing::MockTransport;
    use proxy::RequestBody;
    use serde_json::json;

    use super::*;

    fn args(url: &str) -> ProxyArgs {
        ProxyArgs {
            url: url.to_string(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            json: None,
        }
    }

    #[test]
    fn headers_split_on_the_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization", "Bearer a:b")
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[tokio::test]
    async fn proxy_forwards_headers_and_json_body() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({ "ok": true }));
        let relay = RelayClient::new(Arc::clone(&mock));

        let output = proxy(
            &relay,
            ProxyArgs {
                method: HttpMethod::Post,
                headers: vec!["X-Api-Key: k".into()],
                json: Some(r#"{"n":1}"#.into()),
                ..args("https://api.example.com/orders")
            },
        )
        .await
        .unwrap();

        assert!(output.contains("\"ok\": true"));
        let request = &mock.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.query_value("url"), Some("https://api.example.com/orders"));
        assert_eq!(request.headers, vec![("X-Api-Key".into(), "k".into())]);
        assert_eq!(request.body, RequestBody::Json(json!({ "n": 1 })));
    }

    #[tokio::test]
    async fn invalid_json_body_fails_before_sending() {
        let mock = Arc::new(MockTransport::new());
        let relay = RelayClient::new(Arc::clone(&mock));

        let result = proxy(
            &relay,
            ProxyArgs {
                json: Some("{not json".into()),
                ..args("https://a")
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn ip_returns_the_outbound_address() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({ "outbound_ip": "52.59.103.54" }));

        let relay = RelayClient::new(mock);
        assert_eq!(ip(&relay).await.unwrap(), "52.59.103.54");
    }
}
