//! Macro for string-backed domain enums
//!
//! Providers, job types, statuses and error categories all travel as
//! lowercase snake_case strings (config files, SQLite columns, webhook
//! payloads). The macro keeps the string table in one place.
//!
//! # Example
//!
//! ```rust
//! use crmsync_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Email,
//!     Webhook,
//! }
//!
//! impl_domain_enum_conversions!(Channel {
//!     Email => "email",
//!     Webhook => "webhook",
//! });
//!
//! assert_eq!(Channel::Webhook.as_str(), "webhook");
//! assert_eq!("EMAIL".parse::<Channel>().unwrap(), Channel::Email);
//! assert_eq!(Channel::ALL.len(), 2);
//! ```

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a fieldless enum.
///
/// Parsing is case-insensitive and ignores surrounding whitespace. The error
/// message names the enum and the rejected input.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$enum_name] = &[$(Self::$variant),+];

            /// Stable string representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::std::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Queued,
        InFlight,
        Done,
    }

    impl_domain_enum_conversions!(Phase {
        Queued => "queued",
        InFlight => "in_flight",
        Done => "done",
    });

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(Phase::InFlight.to_string(), "in_flight");
        assert_eq!(Phase::Done.as_str(), "done");
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(Phase::from_str(" IN_FLIGHT ").unwrap(), Phase::InFlight);
        assert_eq!(Phase::from_str("Queued").unwrap(), Phase::Queued);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = Phase::from_str("paused").unwrap_err();
        assert!(err.contains("Invalid Phase: paused"));
        assert!(Phase::from_str("").is_err());
    }

    mod with_result_alias {
        use crate::errors::Result;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Lane {
            Fast,
            Slow,
        }

        impl_domain_enum_conversions!(Lane {
            Fast => "fast",
            Slow => "slow",
        });

        pub fn parse(raw: &str) -> Result<Lane> {
            raw.parse().map_err(crate::errors::CrmSyncError::InvalidInput)
        }
    }

    #[test]
    fn expands_next_to_a_single_argument_result_alias() {
        use with_result_alias::{parse, Lane};

        assert_eq!(parse("slow").unwrap(), Lane::Slow);
        assert!(parse("medium").is_err());
    }

    #[test]
    fn all_lists_every_variant_once() {
        assert_eq!(Phase::ALL, &[Phase::Queued, Phase::InFlight, Phase::Done]);
        for phase in Phase::ALL {
            assert_eq!(Phase::from_str(phase.as_str()).unwrap(), *phase);
        }
    }
}
