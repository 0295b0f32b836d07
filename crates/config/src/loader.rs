use std::path::Path;

use anyhow::{Context, bail};
use indoc::formatdoc;
use url::Url;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

    validate(&config)?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let base_url = &config.gemini.base_url;

    match Url::parse(base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => (),
        Ok(url) => bail!("gemini.base_url must use http or https, got '{}'", url.scheme()),
        Err(e) => bail!("gemini.base_url '{base_url}' is not a valid URL: {e}"),
    }

    if config.gemini.default_model.trim().is_empty() {
        bail!("gemini.default_model must not be empty");
    }

    if config.gemini.api_key.is_none() {
        log::warn!("{}", formatdoc! {r#"
            No Gemini API key configured. Requests will be forwarded without a key.

            Set one in the configuration file:

              [gemini]
              api_key = "..."

            or through the GEMINI_API_KEY environment variable.
        "#});
    }

    if config.access_log.enabled && config.access_log.path.as_os_str().is_empty() {
        bail!("access_log.path must be set when the access log is enabled");
    }

    Ok(())
}
