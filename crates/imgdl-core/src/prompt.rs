//! Interactive resolution of batch fields the config file and flags left unset.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{BatchConfig, ConfigError, FileConfig, DEFAULT_SAVE_PATH};

const INVALID_NUMBER: &str = "Invalid input. Please enter a positive integer: ";

/// Build a `BatchConfig` from `partial`, prompting on `output` and reading
/// answers from `input` for every missing or invalid batch field.
pub fn resolve<R: BufRead, W: Write>(
    partial: &FileConfig,
    input: &mut R,
    output: &mut W,
) -> Result<BatchConfig, ConfigError> {
    let total_count = match partial.count {
        Some(n) if n > 0 => n,
        other => {
            if other.is_some() {
                tracing::warn!("configured count must be positive; prompting instead");
            }
            prompt_positive(
                "Enter the number of images to download: ",
                "count",
                input,
                output,
            )?
        }
    };

    let parallelism = match partial.parallelism {
        Some(n) if n > 0 => n,
        other => {
            if other.is_some() {
                tracing::warn!("configured parallelism must be positive; prompting instead");
            }
            prompt_positive(
                "Enter the maximum parallel download limit: ",
                "parallelism",
                input,
                output,
            )?
        }
    };

    let save_path = match partial.save_path.as_ref() {
        Some(p) if !p.as_os_str().is_empty() => p.clone(),
        _ => prompt_save_path(input, output)?,
    };

    Ok(BatchConfig::new(total_count, parallelism, save_path)?
        .with_source(partial.source())
        .with_quiesce_timeout(partial.quiesce_timeout()))
}

fn prompt_positive<T, R, W>(
    question: &str,
    field: &'static str,
    input: &mut R,
    output: &mut W,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8>,
    R: BufRead,
    W: Write,
{
    write!(output, "{question}")?;
    output.flush()?;
    loop {
        let line = read_answer(field, input)?;
        match line.parse::<T>() {
            Ok(n) if n > T::from(0) => return Ok(n),
            _ => {
                write!(output, "{INVALID_NUMBER}")?;
                output.flush()?;
            }
        }
    }
}

fn prompt_save_path<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf, ConfigError> {
    write!(output, "Enter the save path (default: {DEFAULT_SAVE_PATH}): ")?;
    output.flush()?;
    let line = read_answer("save path", input)?;
    if line.is_empty() {
        Ok(PathBuf::from(DEFAULT_SAVE_PATH))
    } else {
        Ok(PathBuf::from(line))
    }
}

fn read_answer<R: BufRead>(field: &'static str, input: &mut R) -> Result<String, ConfigError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(ConfigError::InputClosed(field));
    }
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    fn run(partial: &FileConfig, answers: &str) -> (Result<BatchConfig, ConfigError>, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let res = resolve(partial, &mut input, &mut output);
        (res, String::from_utf8(output).unwrap())
    }

    #[test]
    fn prompts_for_everything_and_defaults_path() {
        let (res, out) = run(&FileConfig::default(), "5\n2\n\n");
        let cfg = res.unwrap();
        assert_eq!(cfg.total_count(), 5);
        assert_eq!(cfg.parallelism(), 2);
        assert_eq!(cfg.save_path(), Path::new(DEFAULT_SAVE_PATH));
        assert!(out.contains("Enter the number of images to download: "));
        assert!(out.contains("Enter the maximum parallel download limit: "));
        assert!(out.contains("Enter the save path (default: ./outputs): "));
    }

    #[test]
    fn reprompts_on_invalid_numbers() {
        let (res, out) = run(&FileConfig::default(), "abc\n0\n-3\n7\n 3 \n/tmp/x\n");
        let cfg = res.unwrap();
        assert_eq!(cfg.total_count(), 7);
        assert_eq!(cfg.parallelism(), 3);
        assert_eq!(cfg.save_path(), Path::new("/tmp/x"));
        assert_eq!(out.matches(INVALID_NUMBER).count(), 3);
    }

    #[test]
    fn configured_fields_are_not_prompted() {
        let partial = FileConfig {
            count: Some(4),
            save_path: Some(PathBuf::from("pics")),
            ..FileConfig::default()
        };
        let (res, out) = run(&partial, "2\n");
        let cfg = res.unwrap();
        assert_eq!(cfg.total_count(), 4);
        assert_eq!(cfg.parallelism(), 2);
        assert_eq!(cfg.save_path(), Path::new("pics"));
        assert!(!out.contains("number of images"));
        assert!(!out.contains("save path"));
    }

    #[test]
    fn zero_from_config_is_prompted() {
        let partial = FileConfig {
            count: Some(0),
            parallelism: Some(1),
            save_path: Some(PathBuf::from("pics")),
            ..FileConfig::default()
        };
        let (res, out) = run(&partial, "9\n");
        assert_eq!(res.unwrap().total_count(), 9);
        assert!(out.contains("number of images"));
    }

    #[test]
    fn closed_input_is_an_error() {
        let (res, _) = run(&FileConfig::default(), "5\n");
        assert!(matches!(res, Err(ConfigError::InputClosed("parallelism"))));
    }
}
