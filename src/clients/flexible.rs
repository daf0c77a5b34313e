use crate::clients::openai::{OpenAIClient, OpenAIConfig};
use crate::config::KeyFromEnv;
use crate::core::AiProvider;

/// Provider selected by the binaries; converts into the boxed provider the service takes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientType {
    OpenAI,
    Mock,
}

impl From<ClientType> for Box<dyn AiProvider> {
    fn from(client_type: ClientType) -> Self {
        match client_type {
            ClientType::OpenAI => Box::new(OpenAIClient::default()),
            ClientType::Mock => {
                // Uncontrollable mock: the handle is dropped, every call errors and
                // the cascades fall through to their static content.
                use super::mock::MockClient;
                let (mock_client, _handle) = MockClient::new();
                Box::new(mock_client)
            }
        }
    }
}

impl Default for ClientType {
    /// Get the default client type based on available API keys
    fn default() -> Self {
        if OpenAIConfig::find_key().is_some() {
            Self::OpenAI
        } else {
            Self::Mock
        }
    }
}

impl std::str::FromStr for ClientType {
    type Err = String;

    /// Parse client type from string (case insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown client type: '{}'. Supported: openai, mock", s)),
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientType::OpenAI => write!(f, "OpenAI"),
            ClientType::Mock => write!(f, "Mock"),
        }
    }
}
