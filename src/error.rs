use std::{error::Error, fmt::Display};

#[derive(Debug)]
pub enum BotError {
    ConfigToken,
    HttpClient(String),
}

impl Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigToken => write!(f, "Error: no Discord token"),
            Self::HttpClient(e) => write!(f, "Error: could not build HTTP client: {e}"),
        }
    }
}

impl Error for BotError {}
