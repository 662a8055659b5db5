//! Template-driven formatting of HTTP exchanges for logs.

use std::collections::HashMap;

use crate::{Error, Request, Response};

/// Formats a request, its response and its error through a template.
///
/// Templates contain `{token}` placeholders:
///
/// | token | value |
/// |---|---|
/// | `{request}` / `{response}` | full message (start line, headers, body) |
/// | `{method}`, `{uri}` / `{url}`, `{target}` | request line parts |
/// | `{host}` / `{hostname}` | request host |
/// | `{version}`, `{req_version}`, `{res_version}` | protocol version |
/// | `{code}`, `{phrase}` | response status |
/// | `{req_headers}`, `{res_headers}`, `{req_body}`, `{res_body}` | message parts |
/// | `{req_header_<Name>}`, `{res_header_<Name>}` | single header |
/// | `{error}` | error message |
/// | `{ts}` / `{date_iso_8601}`, `{date_common_log}` | current time |
///
/// Response tokens render `NULL` when there is no response, `{error}` when
/// there is no error; unknown tokens render empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormatter {
    template: String,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(Self::DEBUG)
    }
}

impl MessageFormatter {
    /// Apache common log format.
    pub const CLF: &'static str = "{hostname} {req_header_User-Agent} - [{date_common_log}] \"{method} {target} HTTP/{version}\" {code} {res_header_Content-Length}";
    /// Full request and response.
    pub const DEBUG: &'static str = ">>>>>>>>\n{request}\n<<<<<<<<\n{response}\n--------\n{error}";
    /// One line per exchange.
    pub const SHORT: &'static str = "[{ts}] \"{method} {target} HTTP/{version}\" {code}";

    /// A formatter using `template`.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template for one exchange.
    #[must_use]
    pub fn format(
        &self,
        request: &Request,
        response: Option<&Response>,
        error: Option<&Error>,
    ) -> String {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            let (before, from_brace) = rest.split_at(start);
            output.push_str(before);
            let token = from_brace
                .get(1..)
                .and_then(|inner| inner.find('}').map(|end| (inner, end)))
                .and_then(|(inner, end)| inner.get(..end))
                .filter(|name| is_token(name.trim()));
            match token {
                Some(name) => {
                    output.push_str(&render(name.trim(), request, response, error));
                    rest = from_brace.get(name.len() + 2..).unwrap_or_default();
                }
                None => {
                    output.push('{');
                    rest = from_brace.get(1..).unwrap_or_default();
                }
            }
        }
        output.push_str(rest);
        output
    }
}

fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn render(
    token: &str,
    request: &Request,
    response: Option<&Response>,
    error: Option<&Error>,
) -> String {
    const NULL: &str = "NULL";
    let or_null = |value: Option<String>| value.unwrap_or_else(|| NULL.to_string());

    match token {
        "request" => request_message(request),
        "response" => response.map(response_message).unwrap_or_default(),
        "method" => request.method().to_string(),
        "uri" | "url" => request.url().to_string(),
        "target" => target(request.url()),
        "host" | "hostname" => request.url().host_str().unwrap_or_default().to_string(),
        "version" | "req_version" => "1.1".to_string(),
        "res_version" => or_null(response.map(|_| "1.1".to_string())),
        "code" => or_null(response.map(|r| r.status().to_string())),
        "phrase" => or_null(response.map(|r| r.reason().to_string())),
        "req_headers" => header_lines(request.headers()),
        "res_headers" => or_null(response.map(|r| header_lines(r.headers()))),
        "req_body" => request
            .body()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default(),
        "res_body" => or_null(response.map(Response::contents)),
        "error" => or_null(error.map(ToString::to_string)),
        "ts" | "date_iso_8601" => chrono::Utc::now().to_rfc3339(),
        "date_common_log" => chrono::Utc::now()
            .format("%d/%b/%Y:%H:%M:%S %z")
            .to_string(),
        _ => {
            if let Some(name) = token.strip_prefix("req_header_") {
                request.header(name).unwrap_or_default().to_string()
            } else if let Some(name) = token.strip_prefix("res_header_") {
                response
                    .and_then(|r| r.header(name))
                    .unwrap_or_default()
                    .to_string()
            } else {
                String::new()
            }
        }
    }
}

fn target(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

fn header_lines(headers: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort_unstable_by_key(|name| name.to_ascii_lowercase());
    names
        .into_iter()
        .filter_map(|name| headers.get(name).map(|value| format!("{name}: {value}")))
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn request_message(request: &Request) -> String {
    let mut message = format!("{} {} HTTP/1.1\r\n", request.method(), target(request.url()));
    if request.header("Host").is_none()
        && let Some(host) = request.url().host_str()
    {
        message.push_str("Host: ");
        message.push_str(host);
        message.push_str("\r\n");
    }
    let headers = header_lines(request.headers());
    if !headers.is_empty() {
        message.push_str(&headers);
        message.push_str("\r\n");
    }
    message.push_str("\r\n");
    if let Some(body) = request.body() {
        message.push_str(&String::from_utf8_lossy(body));
    }
    message
}

fn response_message(response: &Response) -> String {
    let mut message = format!("HTTP/1.1 {} {}\r\n", response.status(), response.reason());
    let headers = header_lines(response.headers());
    if !headers.is_empty() {
        message.push_str(&headers);
        message.push_str("\r\n");
    }
    message.push_str("\r\n");
    message.push_str(&response.contents());
    message
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use bytes::Bytes;
    use insta::assert_snapshot;

    use super::*;
    use crate::Method;

    fn request() -> Request {
        let url = url::Url::parse("https://api.example.com/cgi-bin/user/info?openid=o1").expect("url");
        Request::builder(Method::Post, url)
            .header("User-Agent", "sdkit-test")
            .header("Content-Type", "application/json")
            .body(Bytes::from(r#"{"lang":"zh_CN"}"#))
            .build()
    }

    fn response() -> Response {
        let headers = HashMap::from([("Content-Length".to_string(), "11".to_string())]);
        Response::new(200, headers, Bytes::from(r#"{"errcode":0}"#))
    }

    #[test]
    fn short_tokens() {
        let formatter = MessageFormatter::new("{method} {target} HTTP/{version} {code} {phrase}");
        check!(
            formatter.format(&request(), Some(&response()), None)
                == "POST /cgi-bin/user/info?openid=o1 HTTP/1.1 200 OK"
        );
        check!(
            formatter.format(&request(), None, None)
                == "POST /cgi-bin/user/info?openid=o1 HTTP/1.1 NULL NULL"
        );
    }

    #[test]
    fn header_tokens_and_unknowns() {
        let formatter = MessageFormatter::new(
            "{host} {req_header_user-agent} {res_header_Content-Length} [{nope}] {not a token}",
        );
        check!(
            formatter.format(&request(), Some(&response()), None)
                == "api.example.com sdkit-test 11 [] {not a token}"
        );
    }

    #[test]
    fn debug_template() {
        let formatter = MessageFormatter::default();
        let rendered = formatter.format(&request(), Some(&response()), None);
        assert_snapshot!(rendered.replace("\r\n", "\n"), @r#"
        >>>>>>>>
        POST /cgi-bin/user/info?openid=o1 HTTP/1.1
        Host: api.example.com
        Content-Type: application/json
        User-Agent: sdkit-test

        {"lang":"zh_CN"}
        <<<<<<<<
        HTTP/1.1 200 OK
        Content-Length: 11

        {"errcode":0}
        --------
        NULL
        "#);
    }

    #[test]
    fn error_token() {
        let formatter = MessageFormatter::new("{code} {error}");
        let error = Error::connection("refused");
        check!(formatter.format(&request(), None, Some(&error)) == "NULL connection error: refused");
    }

    #[test]
    fn timestamps_render() {
        let formatter = MessageFormatter::new(MessageFormatter::SHORT);
        let rendered = formatter.format(&request(), Some(&response()), None);
        check!(rendered.starts_with("[20"));
        check!(rendered.ends_with("\"POST /cgi-bin/user/info?openid=o1 HTTP/1.1\" 200"));
    }
}
