//! Access tokens attached to outgoing requests.

use std::fmt;
use std::sync::Arc;

use crate::{Request, RequestOptions, Result, ServiceContainer, WeakServiceContainer, encode_pairs};

/// A credential applied to each outgoing request.
///
/// The default implementation leaves requests untouched.
pub trait AccessToken: Send + Sync {
    /// Return `request` with the credential attached.
    ///
    /// # Errors
    ///
    /// Returns an error when the credential cannot be obtained or encoded.
    fn apply_to_request(&self, request: Request, options: &RequestOptions) -> Result<Request> {
        let _ = options;
        Ok(request)
    }
}

/// An access token shared between the container and the clients.
pub type SharedAccessToken = Arc<dyn AccessToken>;

/// Supplies the query parameters carrying a credential.
pub trait AppendQuery: Send + Sync {
    /// Parameters to add to the query of `request`.
    ///
    /// `query` holds the request's current pairs; those keep their values on
    /// collision.
    ///
    /// # Errors
    ///
    /// Returns an error when the credential cannot be obtained.
    fn append_query(
        &self,
        query: &[(String, String)],
        request: &Request,
        options: &RequestOptions,
    ) -> Result<Vec<(String, String)>>;
}

/// An access token sent as query parameters.
///
/// The hook's pairs come first in the rebuilt query, followed by the pairs
/// the request already had. A key present in both keeps the request's value
/// at the hook's position.
pub struct QueryAccessToken<H> {
    container: WeakServiceContainer,
    hook: H,
}

impl<H: fmt::Debug> fmt::Debug for QueryAccessToken<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryAccessToken")
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

impl<H: AppendQuery> QueryAccessToken<H> {
    /// A token owned by `container`.
    #[must_use]
    pub fn new(container: &ServiceContainer, hook: H) -> Self {
        Self {
            container: container.downgrade(),
            hook,
        }
    }

    /// The owning container, while it is alive.
    #[must_use]
    pub fn container(&self) -> Option<ServiceContainer> {
        self.container.upgrade()
    }

    /// The query hook.
    #[must_use]
    pub fn hook(&self) -> &H {
        &self.hook
    }
}

impl<H: AppendQuery> AccessToken for QueryAccessToken<H> {
    fn apply_to_request(&self, request: Request, options: &RequestOptions) -> Result<Request> {
        let existing = request.query_pairs();
        let appended = self.hook.append_query(&existing, &request, options)?;
        let query = encode_pairs(&merge_query(appended, existing))?;

        let mut url = request.url().clone();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        tracing::trace!(url = %url, "access token applied");
        Ok(request.with_url(url))
    }
}

/// Merge `existing` over `appended`: first occurrence fixes a key's
/// position, the last value wins.
fn merge_query(
    appended: Vec<(String, String)>,
    existing: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::with_capacity(appended.len() + existing.len());
    for (key, value) in appended.into_iter().chain(existing) {
        match merged.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => merged.push((key, value)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use assert2::check;
    use serde_json::Value;

    use super::*;
    use crate::Method;

    #[derive(Debug)]
    struct StaticToken;

    impl AppendQuery for StaticToken {
        fn append_query(
            &self,
            _query: &[(String, String)],
            _request: &Request,
            _options: &RequestOptions,
        ) -> Result<Vec<(String, String)>> {
            Ok(vec![
                ("access_token".to_string(), "secret".to_string()),
                ("lang".to_string(), "en".to_string()),
            ])
        }
    }

    fn request(raw: &str) -> Request {
        Request::builder(Method::Get, url::Url::parse(raw).expect("url")).build()
    }

    #[test]
    fn hook_keys_first_existing_values_win() {
        let container = ServiceContainer::new(Value::Null).expect("container");
        let token = QueryAccessToken::new(&container, StaticToken);

        let original = request("https://api.example.com/user/info?openid=o1&lang=zh_CN");
        let signed = token
            .apply_to_request(original.clone(), &RequestOptions::default())
            .expect("signed");

        check!(signed.url().query() == Some("access_token=secret&lang=zh_CN&openid=o1"));
        check!(original.url().query() == Some("openid=o1&lang=zh_CN"));
        check!(token.container().is_some());
    }

    #[test]
    fn empty_query_gets_hook_pairs() {
        let container = ServiceContainer::new(Value::Null).expect("container");
        let token = QueryAccessToken::new(&container, StaticToken);

        let signed = token
            .apply_to_request(request("https://api.example.com/menu"), &RequestOptions::default())
            .expect("signed");
        check!(signed.url().as_str() == "https://api.example.com/menu?access_token=secret&lang=en");
    }

    #[test]
    fn default_token_is_pass_through() {
        struct Noop;
        impl AccessToken for Noop {}

        let original = request("https://api.example.com/menu?x=1");
        let same = Noop
            .apply_to_request(original.clone(), &RequestOptions::default())
            .expect("unchanged");
        check!(same.url() == original.url());
    }

    #[test]
    fn merge_keeps_first_position_last_value() {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
        let merged = merge_query(
            vec![pair("a", "1"), pair("b", "2")],
            vec![pair("c", "3"), pair("a", "9")],
        );
        check!(merged == vec![pair("a", "9"), pair("b", "2"), pair("c", "3")]);
    }
}
