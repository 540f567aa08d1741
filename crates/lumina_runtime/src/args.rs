//! Command-line arguments
//!
//! ```text
//! lumina [--config lumina.toml] [--output image.png] [--threads N] scene.json
//! ```

use std::path::PathBuf;

use crate::error::{Result, RuntimeError};

pub const USAGE: &str = "\
usage: lumina [OPTIONS] <scene.json>

options:
  -c, --config <file>    session configuration (TOML)
  -o, --output <file>    write the film to a PNG image
  -t, --threads <n>      render threads (0 = all cores)
  -h, --help             print this message";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub scene: PathBuf,
    pub output: Option<PathBuf>,
    pub threads: Option<usize>,
}

impl Args {
    /// Parse arguments after the program name; `None` means help was requested
    pub fn parse<I>(args: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut scene = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "-c" | "--config" => parsed.config = Some(value(&arg, args.next())?.into()),
                "-o" | "--output" => parsed.output = Some(value(&arg, args.next())?.into()),
                "-t" | "--threads" => {
                    let n = value(&arg, args.next())?;
                    parsed.threads = Some(n.parse().map_err(|_| {
                        RuntimeError::usage(format!("invalid thread count '{}'", n))
                    })?);
                }
                flag if flag.starts_with('-') => {
                    return Err(RuntimeError::usage(format!("unknown option '{}'", flag)));
                }
                _ if scene.is_some() => {
                    return Err(RuntimeError::usage(format!("unexpected argument '{}'", arg)));
                }
                _ => scene = Some(PathBuf::from(&arg)),
            }
        }

        parsed.scene = scene.ok_or_else(|| RuntimeError::usage("missing scene file"))?;
        Ok(Some(parsed))
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String> {
    next.ok_or_else(|| RuntimeError::usage(format!("{} needs a value", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_full_command_line() {
        let args = parse(&["-c", "lumina.toml", "scene.json", "--output", "out.png", "-t", "3"])
            .unwrap()
            .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("lumina.toml")));
        assert_eq!(args.scene, PathBuf::from("scene.json"));
        assert_eq!(args.output, Some(PathBuf::from("out.png")));
        assert_eq!(args.threads, Some(3));
    }

    #[test]
    fn test_help() {
        assert_eq!(parse(&["scene.json", "--help"]).unwrap(), None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse(&[]), Err(RuntimeError::Usage(m)) if m.contains("missing")));
        assert!(matches!(parse(&["a.json", "b.json"]), Err(RuntimeError::Usage(_))));
        assert!(matches!(parse(&["--bogus", "a.json"]), Err(RuntimeError::Usage(_))));
        assert!(matches!(parse(&["a.json", "-t", "x"]), Err(RuntimeError::Usage(_))));
        assert!(matches!(parse(&["a.json", "-o"]), Err(RuntimeError::Usage(_))));
    }
}
