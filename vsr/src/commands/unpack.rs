use anyhow::{Result, bail};
use clap::Args;
use std::{
    io::{Read, stdin},
    path::PathBuf,
};
use vsr_core::unpack;

/// Unpack an `eval(function(p,a,c,k,e,d){...})` packed script.
#[derive(Debug, Clone, Args)]
pub struct Unpack {
    /// Path of file holding the packed script, `-` reads from stdin.
    #[arg(required = true)]
    input: PathBuf,
}

impl Unpack {
    pub fn execute(self) -> Result<()> {
        let text = if self.input.as_os_str() == "-" {
            let mut text = String::new();
            stdin().read_to_string(&mut text)?;
            text
        } else {
            std::fs::read_to_string(&self.input)?
        };

        if !unpack::detect(&text) {
            bail!("no packed script signature found in {}", self.input.display());
        }

        let Some(source) = unpack::unpack(&text) else {
            bail!("packed script in {} could not be unpacked", self.input.display());
        };

        println!("{}", source);
        Ok(())
    }
}
