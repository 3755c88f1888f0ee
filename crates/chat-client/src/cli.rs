use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("empty value for argument: {0}")]
    EmptyValue(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--api-url" => options.api_url = Some(required_value(&arg, iter.next())?),
                "--access-token" => {
                    options.access_token = Some(required_value(&arg, iter.next())?);
                }
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(options)
    }
}

fn required_value(arg: &str, value: Option<String>) -> Result<String, CliError> {
    let value = value.ok_or_else(|| CliError::MissingValue(arg.to_string()))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyValue(arg.to_string()));
    }
    Ok(trimmed.to_string())
}
