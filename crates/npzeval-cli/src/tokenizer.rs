use std::path::Path;

use anyhow::{anyhow, Context, Result};
use npzeval_runtime::{SpecialTokens, Tokenizer};

/// WordPiece (or any HuggingFace) tokenizer loaded from a `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    special: SpecialTokens,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow!("failed to load tokenizer {}: {e}", path.display()))?;

        // Framing, truncation and padding are applied by `npzeval_runtime::encode`.
        inner.with_padding(None);
        inner
            .with_truncation(None)
            .map_err(|e| anyhow!("failed to disable tokenizer truncation: {e}"))?;

        let special = SpecialTokens {
            cls: token_id(&inner, "[CLS]")?,
            sep: token_id(&inner, "[SEP]")?,
            pad: token_id(&inner, "[PAD]")?,
        };
        tracing::debug!(path = %path.display(), ?special, "tokenizer loaded");

        Ok(Self { inner, special })
    }
}

fn token_id(tokenizer: &tokenizers::Tokenizer, token: &str) -> Result<i64> {
    tokenizer
        .token_to_id(token)
        .map(i64::from)
        .with_context(|| format!("tokenizer vocabulary has no {token} token"))
}

impl Tokenizer for HfTokenizer {
    fn ids(&self, text: &str) -> Result<Vec<i64>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("{e}"))?;
        Ok(encoding.get_ids().iter().map(|&id| i64::from(id)).collect())
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}
