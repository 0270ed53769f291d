use std::path::PathBuf;

use anyhow::{anyhow, bail};
use machine_learning::arch::ModelKind;

pub const USAGE: &str =
    "Usage: mnist-pipelines <mlp|cnn> [--config <file.json>] [--data <dir>] [--show <out.png>] [bitmap ...]";

/// The parsed command line.
#[derive(Debug, PartialEq)]
pub struct Args {
    pub kind: ModelKind,
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub show: Option<PathBuf>,
    /// Bitmaps to classify once the model is trained.
    pub bitmaps: Vec<PathBuf>,
}

impl Args {
    /// Parses the arguments, `args[0]` being the program's name.
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let Some(kind) = args.get(1) else {
            bail!("missing the model kind");
        };

        let mut parsed = Args {
            kind: kind.parse()?,
            config: None,
            data: None,
            show: None,
            bitmaps: Vec::new(),
        };

        let mut rest = args[2..].iter();
        while let Some(arg) = rest.next() {
            let mut value = || {
                rest.next()
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("{arg} expects a value"))
            };

            match arg.as_str() {
                "--config" => parsed.config = Some(value()?),
                "--data" => parsed.data = Some(value()?),
                "--show" => parsed.show = Some(value()?),
                flag if flag.starts_with("--") => bail!("unknown option {flag}"),
                bitmap => parsed.bitmaps.push(PathBuf::from(bitmap)),
            }
        }

        Ok(parsed)
    }
}
