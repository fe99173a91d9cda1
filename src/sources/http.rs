//! Blocking HTTP seam used by every provider.
//!
//! Providers depend on [`HttpClient`] rather than on `ureq` directly so that
//! tests can substitute canned responses.

use std::io::Read;

use tracing::{debug, trace};

use super::types::SourceError;

/// User-Agent sent when a provider does not ask for a specific one.
pub const DEFAULT_USER_AGENT: &str = concat!("lilyfarm/", env!("CARGO_PKG_VERSION"));

/// Minimal blocking GET interface.
pub trait HttpClient: Send + Sync {
    /// GET `url` with the given query parameters and headers, returning the
    /// body of a `200 OK` response.
    ///
    /// `url` must not contain credentials; they belong in `query` so they
    /// stay out of error messages.
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, SourceError>;
}

/// [`HttpClient`] backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(DEFAULT_USER_AGENT)
                .build(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, SourceError> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        for (name, value) in headers {
            request = request.set(name, value);
        }

        debug!(url, params = query.len(), "GET");

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(SourceError::UnexpectedStatus {
                    url: url.to_string(),
                    status,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SourceError::Transport {
                    url: url.to_string(),
                    source: Box::new(transport),
                })
            }
        };

        // ureq only errors on 4xx/5xx; anything else that is not 200 is
        // still not a body we can use.
        if response.status() != 200 {
            return Err(SourceError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| SourceError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        trace!(url, bytes = body.len(), "response body read");
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording stand-in for [`HttpClient`].

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    pub enum Reply {
        Body(String),
        Status(u16),
        Unreachable,
    }

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub url: String,
        pub query: Vec<(String, String)>,
        pub headers: Vec<(String, String)>,
    }

    impl Recorded {
        pub fn param(&self, key: &str) -> Option<&str> {
            self.query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }

        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replies are queued per URL; the last reply for a URL repeats.
    #[derive(Default)]
    pub struct MockHttpClient {
        replies: Mutex<HashMap<String, Vec<Reply>>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, url: &str, reply: Reply) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(reply);
            self
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.requests().iter().filter(|r| r.url == url).count()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(
            &self,
            url: &str,
            query: &[(&str, &str)],
            headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, SourceError> {
            self.requests.lock().unwrap().push(Recorded {
                url: url.to_string(),
                query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            });

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                match replies.get_mut(url) {
                    Some(queue) if queue.len() > 1 => queue.remove(0),
                    Some(queue) if queue.len() == 1 => queue[0].clone(),
                    _ => Reply::Status(404),
                }
            };

            match reply {
                Reply::Body(body) => Ok(body.into_bytes()),
                Reply::Status(status) => Err(SourceError::UnexpectedStatus {
                    url: url.to_string(),
                    status,
                }),
                Reply::Unreachable => Err(SourceError::Transport {
                    url: url.to_string(),
                    source: Box::new(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    )),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use std::error::Error;

    #[test]
    fn test_default_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("lilyfarm/"));
    }

    #[test]
    fn test_mock_records_and_queues() {
        let client = MockHttpClient::new()
            .reply("http://a", Reply::Body("first".into()))
            .reply("http://a", Reply::Body("second".into()));

        let one = client.get("http://a", &[("k", "v")], &[("Accept", "x")]).unwrap();
        let two = client.get("http://a", &[], &[]).unwrap();
        let three = client.get("http://a", &[], &[]).unwrap();
        assert_eq!(one, b"first");
        assert_eq!(two, b"second");
        assert_eq!(three, b"second");

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].param("k"), Some("v"));
        assert_eq!(requests[0].header("accept"), Some("x"));
    }

    #[test]
    fn test_mock_transport_error_keeps_cause() {
        let client = MockHttpClient::new().reply("http://down", Reply::Unreachable);
        let err = client.get("http://down", &[], &[]).unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }));
        assert!(err.source().is_some());
    }
}
