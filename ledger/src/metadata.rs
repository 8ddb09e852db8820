//! Display metadata of the wrapped token.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

impl TokenMetadata {
    pub const WETH: Self = Self {
        name: "Wrapped Ether",
        symbol: "WETH",
        decimals: 18,
    };
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self::WETH
    }
}
