use std::io::Read;

use color_eyre::{Result, eyre::ensure};

use crate::FluxError;

/// Source of the prompt text, normally stdin
pub struct PromptInput<R> {
    reader: R,
    interactive: bool,
}

impl<R: Read> PromptInput<R> {
    /// `interactive` asks the user for input before reading, set it when the
    /// reader is a terminal
    pub fn new(reader: R, interactive: bool) -> Self {
        Self {
            reader,
            interactive,
        }
    }

    /// Reads the whole input and trims it, an empty prompt is an error
    pub fn read(mut self) -> Result<String> {
        if self.interactive {
            println!("Enter your prompt:");
        }

        let mut text = String::new();
        self.reader
            .read_to_string(&mut text)
            .map_err(|e| FluxError::io("<stdin>", e))?;

        let prompt = text.trim();
        ensure!(
            !prompt.is_empty(),
            FluxError::validation("Prompt cannot be empty")
        );
        Ok(prompt.to_string())
    }
}
