use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use clap::{Parser, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use http::{
    HeaderMap,
    header::{HeaderName, HeaderValue},
};
use metafetch_lib::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_WAIT_TIME, DEFAULT_USER_AGENT, Fields,
    RateLimitConfig,
    input::KeySource,
    ratelimit::{DEFAULT_CONCURRENCY, DEFAULT_PERIOD, DEFAULT_QUOTA},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};

pub(crate) const METAFETCH_CONFIG_FILE: &str = "metafetch.toml";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const QUOTA_STR: &str = concatcp!(DEFAULT_QUOTA);
const CONCURRENCY_STR: &str = concatcp!(DEFAULT_CONCURRENCY);
const MAX_RETRIES_STR: &str = concatcp!(DEFAULT_MAX_RETRIES);
const PERIOD_STR: &str = "1s";
const TIMEOUT_STR: &str = "20s";
const RETRY_WAIT_TIME_STR: &str = "1s";
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    METAFETCH_CONFIG_FILE,
);

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    quota: usize = DEFAULT_QUOTA;
    period: Duration = DEFAULT_PERIOD;
    concurrency: usize = DEFAULT_CONCURRENCY;
    max_retries: u64 = DEFAULT_MAX_RETRIES;
    retry_wait_time: Duration = DEFAULT_RETRY_WAIT_TIME;
    timeout: Duration = DEFAULT_TIMEOUT;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    base_url: String = DEFAULT_BASE_URL.to_string();
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Parse a single header into a [`HeaderName`] and [`HeaderValue`]
///
/// Headers are expected to be in format `Header-Name: Header-Value`.
/// The header name and value are trimmed of whitespace.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = header.split_once(':') else {
        return Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        ));
    };
    let name = name.trim();
    let name = HeaderName::from_str(name)
        .map_err(|e| anyhow!("Unable to convert header name '{name}': {e}"))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
    Ok((name, value))
}

/// Parses a single HTTP header into a tuple of (String, String)
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let invalid = |message: String| clap::Error::raw(clap::error::ErrorKind::InvalidValue, message);

        let header_str = value
            .to_str()
            .ok_or_else(|| invalid("Header value contains invalid UTF-8".to_string()))?;
        let (name, value) = parse_single_header(header_str).map_err(|e| invalid(e.to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| invalid("Header value contains invalid UTF-8".to_string()))?;
        Ok((name.to_string(), value.to_string()))
    }
}

/// Extension trait for converting a Vec of header pairs to a `HeaderMap`
pub(crate) trait HeaderMapExt {
    /// Convert a collection of header key-value pairs to a `HeaderMap`
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value '{value}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

/// metafetch fetches the metadata of many files from the Google Drive API,
/// as fast as the API quota allows but never faster.
///
/// The results are written as a JSON document with the keys `metadata` and
/// `errors`.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct MetafetchOptions {
    /// File with one file ID per line (`#` starts a comment), or `-` for stdin
    #[arg(
        name = "input",
        long_help = "File with one file ID per line, or `-` to read from stdin.

Surrounding whitespace is ignored, as are blank lines and lines starting
with '#'. Every ID is fetched only once."
    )]
    raw_input: String,

    /// JSON file to store the fetched metadata in
    pub(crate) output: PathBuf,

    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl MetafetchOptions {
    /// Where to read the file IDs from
    pub(crate) fn input(&self) -> KeySource {
        KeySource::new(&self.raw_input)
    }
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// The main configuration for metafetch
#[derive(Parser, Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Do not show progress bar.
    /// This is recommended for non-interactive shells (e.g. for continuous integration)
    #[arg(short, long, verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) no_progress: bool,

    /// Maximum number of requests started per period
    #[arg(long, default_value = QUOTA_STR)]
    #[serde(default = "quota")]
    pub(crate) quota: usize,

    /// Length of the rolling window the quota applies to, e.g. `1s` or `100s`
    #[arg(long, value_parser = humantime::parse_duration, default_value = PERIOD_STR)]
    #[serde(default = "period", with = "humantime_serde")]
    pub(crate) period: Duration,

    /// Maximum number of requests in flight at once.
    /// Values above the quota are lowered to the quota.
    #[arg(long, default_value = CONCURRENCY_STR, verbatim_doc_comment)]
    #[serde(default = "concurrency")]
    pub(crate) concurrency: usize,

    /// Fields to request for every file, e.g. `id,name,mimeType` or `*`.
    /// Omit to get the fields the API returns by default.
    /// For performance, only request fields you need.
    #[arg(long, verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) fields: Option<String>,

    /// Spaces to indent the JSON output by. Omit for compact output
    #[arg(long)]
    #[serde(default)]
    pub(crate) indent: Option<usize>,

    /// Endpoint of the Drive API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    #[serde(default = "base_url")]
    pub(crate) base_url: String,

    /// OAuth access token used to authorize the requests
    #[arg(long, env = "METAFETCH_TOKEN", hide_env_values = true)]
    #[serde(default)]
    pub(crate) token: Option<SecretString>,

    /// Maximum number of retries per request.
    /// Retried requests do not count against the quota.
    #[arg(long, default_value = MAX_RETRIES_STR, verbatim_doc_comment)]
    #[serde(default = "max_retries")]
    pub(crate) max_retries: u64,

    /// Minimum wait time before retrying a failed request
    #[arg(long, value_parser = humantime::parse_duration, default_value = RETRY_WAIT_TIME_STR)]
    #[serde(default = "retry_wait_time", with = "humantime_serde")]
    pub(crate) retry_wait_time: Duration,

    /// Response timeout per request
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = TIMEOUT_STR)]
    #[serde(default = "timeout", with = "humantime_serde")]
    pub(crate) timeout: Duration,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Custom request header, e.g. `X-Goog-User-Project: my-project`
    #[arg(
        short = 'H',
        long = "header",
        value_parser = HeaderParser,
        number_of_values = 1
    )]
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// Stop after this much time and write the results fetched so far
    #[arg(long, value_parser = humantime::parse_duration)]
    #[serde(default, with = "humantime_serde")]
    pub(crate) max_runtime: Option<Duration>,

    /// Also export the metadata as TSV.
    /// Takes a file with one dotted field path per line, e.g. `owners.[].emailAddress`.
    /// The table is written next to the output, with a `.tsv` extension.
    #[arg(long, value_name = "FIELDS_FILE", verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) tsv: Option<PathBuf>,

    /// Number of threads to utilize.
    /// Defaults to number of cores available to the system
    #[arg(short = 'T', long, verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) threads: Option<usize>,
}

impl Config {
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let self_map = self.header.iter().cloned().collect::<HashMap<_, _>>();
        let other_map = other.iter().cloned().collect::<HashMap<_, _>>();

        // Merge the two maps, with `other` taking precedence
        let merged_map: HashMap<_, _> = self_map.into_iter().chain(other_map).collect();

        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        self.merge_headers(&toml.header);

        // This is outside of fold_in! because SecretString doesn't implement Eq.
        if self.token.is_none() && toml.token.is_some() {
            self.token = toml.token;
        }

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..token,

                // Keys with defaults to assign
                verbose: Verbosity::default(),
                no_progress: false,
                quota: DEFAULT_QUOTA,
                period: DEFAULT_PERIOD,
                concurrency: DEFAULT_CONCURRENCY,
                fields: None,
                indent: None,
                base_url: DEFAULT_BASE_URL,
                max_retries: DEFAULT_MAX_RETRIES,
                retry_wait_time: DEFAULT_RETRY_WAIT_TIME,
                timeout: DEFAULT_TIMEOUT,
                user_agent: DEFAULT_USER_AGENT,
                max_runtime: None,
                tsv: None,
                threads: None,
            }
        }
    }

    /// Rate and concurrency ceilings of the batch
    pub(crate) const fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            quota: self.quota,
            period: self.period,
            concurrency: self.concurrency,
        }
    }

    /// The field selector shared by all requests
    pub(crate) fn fields(&self) -> Option<Fields> {
        self.fields.as_deref().and_then(Fields::new)
    }
}
