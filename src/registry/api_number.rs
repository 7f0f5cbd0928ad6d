/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! API version numbers (`major.minor`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An API version such as `3.3`. Versions compare as `major * 1000 + minor`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ApiNumber {
    pub major: u32,
    pub minor: u32,
}

impl ApiNumber {
    pub const fn new(major: u32, minor: u32) -> ApiNumber {
        ApiNumber { major, minor }
    }

    pub fn to_int(self) -> u64 {
        u64::from(self.major) * 1000 + u64::from(self.minor)
    }

    /// Parse the leading `major.minor` of a version string as reported by an
    /// implementation, e.g. `"4.6.0 NVIDIA 535.54"` or
    /// `"OpenGL ES 3.2 Mesa 23.1"`.
    pub fn from_version_string(text: &str) -> Option<ApiNumber> {
        text.split_whitespace()
            .find_map(|word| {
                let mut parts = word.split('.');
                let major = parts.next()?.parse().ok()?;
                let minor = parts.next()?.parse().ok()?;
                Some(ApiNumber::new(major, minor))
            })
    }
}

impl FromStr for ApiNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<ApiNumber, ()> {
        let (major, minor) = s.trim().split_once('.').ok_or(())?;
        let major = major.parse().map_err(|_| ())?;
        let minor = minor.parse().map_err(|_| ())?;
        Ok(ApiNumber { major, minor })
    }
}

impl From<(u32, u32)> for ApiNumber {
    fn from((major, minor): (u32, u32)) -> ApiNumber {
        ApiNumber { major, minor }
    }
}

impl PartialOrd for ApiNumber {
    fn partial_cmp(&self, other: &ApiNumber) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ApiNumber {
    fn cmp(&self, other: &ApiNumber) -> Ordering {
        self.to_int().cmp(&other.to_int())
    }
}

impl fmt::Display for ApiNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiNumber;

    #[test]
    fn parse_and_compare() {
        assert_eq!("3.3".parse(), Ok(ApiNumber::new(3, 3)));
        assert_eq!(" 1.0 ".parse(), Ok(ApiNumber::new(1, 0)));
        assert_eq!("3".parse::<ApiNumber>(), Err(()));
        assert_eq!("a.b".parse::<ApiNumber>(), Err(()));

        assert!(ApiNumber::new(2, 1) < ApiNumber::new(3, 0));
        assert!(ApiNumber::new(3, 3) > ApiNumber::new(3, 2));
        assert_eq!(ApiNumber::new(4, 6).to_int(), 4006);
        assert_eq!(ApiNumber::new(4, 6).to_string(), "4.6");
    }

    #[test]
    fn version_strings() {
        assert_eq!(
            ApiNumber::from_version_string("4.6.0 NVIDIA 535.54.03"),
            Some(ApiNumber::new(4, 6))
        );
        assert_eq!(
            ApiNumber::from_version_string("OpenGL ES 3.2 Mesa 23.1.4"),
            Some(ApiNumber::new(3, 2))
        );
        assert_eq!(ApiNumber::from_version_string("unknown"), None);
    }
}
