use serde::{Deserialize, Serialize};

/// Token usage accumulated over the completions of one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    total_tokens: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Stats {
    pub(crate) fn update_usage(&mut self, total: u64, input: u64, output: u64) {
        self.total_tokens += total;
        self.input_tokens += input;
        self.output_tokens += output;
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}
