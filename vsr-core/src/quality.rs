use regex::Regex;
use serde::{Serialize, Serializer};
use std::{fmt::Display, sync::OnceLock};

/// Quality label attached to a [`Source`](crate::Source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// 2160p, displayed as `4K`.
    Uhd,
    P1440,
    P1080,
    P720,
    P480,
    P360,
    P240,
    /// Any other height inside the accepted range.
    Height(u32),
    Unknown,
}

const MIN_HEIGHT: u32 = 240;
const MAX_HEIGHT: u32 = 4320;

impl Quality {
    pub fn from_height(height: u32) -> Self {
        match height {
            2160 => Self::Uhd,
            1440 => Self::P1440,
            1080 => Self::P1080,
            720 => Self::P720,
            480 => Self::P480,
            360 => Self::P360,
            240 => Self::P240,
            MIN_HEIGHT..=MAX_HEIGHT => Self::Height(height),
            _ => Self::Unknown,
        }
    }

    /// Guess from a variant bandwidth in bits per second.
    pub fn from_bandwidth(bandwidth: u64) -> Self {
        let mbps = bandwidth as f64 / 1_000_000.0;

        if mbps >= 15.0 {
            Self::Uhd
        } else if mbps >= 8.0 {
            Self::P1440
        } else if mbps >= 5.0 {
            Self::P1080
        } else if mbps >= 3.0 {
            Self::P720
        } else {
            Self::Unknown
        }
    }

    /// Guess from markers like `720p`, `1080k`, `quality-480`, `res_360` or `1280x720`
    /// in a url or filename. First matching pattern with a value in range wins.
    pub fn from_url(url: &str) -> Self {
        static PATTERNS: OnceLock<[Regex; 5]> = OnceLock::new();

        let patterns = PATTERNS.get_or_init(|| {
            [
                Regex::new(r"(?i)(\d{3,4})p").unwrap(),
                Regex::new(r"(?i)(\d{3,4})k").unwrap(),
                Regex::new(r"(?i)quality[_-](\d{3,4})").unwrap(),
                Regex::new(r"(?i)res[_-](\d{3,4})").unwrap(),
                Regex::new(r"(?i)(\d{3,4})x\d{3,4}").unwrap(),
            ]
        });

        for pattern in patterns {
            if let Some(value) = pattern
                .captures(url)
                .and_then(|caps| caps.get(1))
                .and_then(|x| x.as_str().parse::<u32>().ok())
            {
                if (MIN_HEIGHT..=MAX_HEIGHT).contains(&value) {
                    return Self::from_height(value);
                }
            }
        }

        Self::Unknown
    }

    /// Parse a declared label such as `1080p`, `4K`, `720` or `auto`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();

        if label.eq_ignore_ascii_case("4k") || label.eq_ignore_ascii_case("uhd") {
            return Self::Uhd;
        }

        let digits = label
            .strip_suffix(['p', 'P'])
            .unwrap_or(label);

        digits
            .parse::<u32>()
            .map(Self::from_height)
            .unwrap_or(Self::Unknown)
    }

    /// Ranking weight, higher is better.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Uhd => 8,
            Self::P1440 => 7,
            Self::P1080 => 6,
            Self::P720 => 5,
            Self::P480 => 4,
            Self::P360 => 3,
            Self::P240 => 2,
            Self::Height(_) | Self::Unknown => 1,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uhd => write!(f, "4K"),
            Self::P1440 => write!(f, "1440p"),
            Self::P1080 => write!(f, "1080p"),
            Self::P720 => write!(f, "720p"),
            Self::P480 => write!(f, "480p"),
            Self::P360 => write!(f, "360p"),
            Self::P240 => write!(f, "240p"),
            Self::Height(x) => write!(f, "{}p", x),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
