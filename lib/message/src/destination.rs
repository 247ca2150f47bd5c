use chrono::{DateTime, Utc};

/// How often a [`Destination`]'s wire name changes (§4.J, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationFrequency {
    Daily,
    Monthly,
    Constant,
}

/// A logical egress destination: a name prefix plus how it's date-suffixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub prefix: String,
    pub frequency: DestinationFrequency,
}

impl Destination {
    pub fn daily(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            frequency: DestinationFrequency::Daily,
        }
    }

    pub fn monthly(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            frequency: DestinationFrequency::Monthly,
        }
    }

    pub fn constant(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            frequency: DestinationFrequency::Constant,
        }
    }

    /// The wire-form name for this destination at `now` (§6):
    /// `prefix-YYYY.MM.dd`, `prefix-YYYY.MM.01`, or plain `prefix`.
    pub fn wire_name(&self, now: DateTime<Utc>) -> String {
        match self.frequency {
            DestinationFrequency::Daily => format!("{}-{}", self.prefix, now.format("%Y.%m.%d")),
            DestinationFrequency::Monthly => format!("{}-{}", self.prefix, now.format("%Y.%m.01")),
            DestinationFrequency::Constant => self.prefix.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wire_names_follow_frequency() {
        let now = Utc.with_ymd_and_hms(2015, 9, 30, 12, 31, 21).unwrap();
        assert_eq!(Destination::daily("logalike").wire_name(now), "logalike-2015.09.30");
        assert_eq!(Destination::monthly("logalike").wire_name(now), "logalike-2015.09.01");
        assert_eq!(Destination::constant("logalike").wire_name(now), "logalike");
    }
}
