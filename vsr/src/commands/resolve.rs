use crate::{
    client::HttpTransport,
    config::{Config, EnvSecrets},
};
use anyhow::{Result, bail};
use clap::{ArgGroup, Args};
use reqwest::Proxy;
use std::{path::PathBuf, time::Duration};
use vsr_core::{MediaReference, Outcome, Pipeline};

/// Resolve a movie or an episode into ranked stream sources, printed as JSON.
#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("media").required(true).args(["movie", "tv"])))]
pub struct Resolve {
    /// JSON file describing site profiles and their candidate urls.
    #[arg(short, long)]
    config: PathBuf,

    /// External id of a movie.
    #[arg(long, value_name = "ID")]
    movie: Option<String>,

    /// External id of a series, used with `--season` and `--episode`.
    #[arg(long, value_name = "ID", requires_all = ["season", "episode"])]
    tv: Option<String>,

    #[arg(long, requires = "tv")]
    season: Option<u32>,

    #[arg(long, requires = "tv")]
    episode: Option<u32>,

    /// Only query these sites.
    /// This option can be used multiple times.
    #[arg(long, value_name = "NAME")]
    site: Vec<String>,

    /// Pretty print the JSON result.
    #[arg(long)]
    pretty: bool,

    /// Seconds to wait for each candidate response.
    /// Overrides `timeout_secs` of the config file.
    #[arg(long, help_heading = "Client Options", value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Custom headers for requests. Headers set by a candidate take precedence.
    /// This option can be used multiple times.
    #[arg(long, help_heading = "Client Options", num_args = 2, value_names = &["KEY", "VALUE"])]
    header: Vec<String>, // Vec<(String, String)> not supported

    /// Skip checking and validation of site certificates.
    #[arg(long, help_heading = "Client Options")]
    no_certificate_checks: bool,

    /// Set http(s) / socks proxy address for requests.
    #[arg(long, help_heading = "Client Options", value_parser = proxy_address_parser)]
    proxy: Option<Proxy>,

    /// Update and set user agent header for requests.
    #[arg(
        long,
        help_heading = "Client Options",
        default_value = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36"
    )]
    user_agent: String,
}

impl Resolve {
    fn reference(&self) -> Result<MediaReference> {
        Ok(match (&self.movie, &self.tv, self.season, self.episode) {
            (Some(id), None, None, None) => MediaReference::movie(id),
            (None, Some(id), Some(season), Some(episode)) => MediaReference::episode(id, season, episode),
            _ => bail!("use either --movie ID or --tv ID --season N --episode N"),
        })
    }

    fn default_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_owned(), self.user_agent.clone())];

        for pair in self.header.chunks_exact(2) {
            headers.push((pair[0].clone(), pair[1].clone()));
        }

        headers
    }

    pub async fn execute(self) -> Result<()> {
        let reference = self.reference()?;
        let config = Config::load(&self.config)?;
        let timeout = Duration::from_secs(self.timeout.unwrap_or(config.timeout_secs));
        let (profiles, templates) = config.build(&EnvSecrets, &self.site, &self.default_headers())?;

        log::debug!(
            "resolving {} {} over {} templates ({:?} timeout)",
            reference.kind,
            reference.item_id(),
            templates.len(),
            timeout
        );

        let transport = HttpTransport::new(self.proxy.clone(), self.no_certificate_checks)?;
        let outcome = Pipeline::new(transport, profiles)
            .with_timeout(timeout)
            .resolve(&reference, &templates)
            .await;

        let failed = matches!(outcome, Outcome::Failed(_));
        let result = outcome.into_result();

        for diagnostic in &result.diagnostics {
            log::debug!("{:?}: {}", diagnostic.code, diagnostic.message);
        }

        if self.pretty {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", serde_json::to_string(&result)?);
        }

        if failed {
            bail!(
                "{}",
                result
                    .diagnostics
                    .first()
                    .map(|x| x.message.as_str())
                    .unwrap_or("resolution failed")
            );
        }

        if result.sources.is_empty() {
            log::warn!("no sources found");
        } else {
            log::info!("found {} sources and {} subtitles", result.sources.len(), result.subtitles.len());
        }

        Ok(())
    }
}

fn proxy_address_parser(s: &str) -> Result<Proxy, String> {
    Proxy::all(s).map_err(|x| x.to_string())
}
