//! Provides formatting and parsing helpers for byte sizes.
//!
//! Memory budgets show up in two places: in the configuration, where humans write them down
//! (`64m`, `1g`), and in diagnostics, where the library reports them back. The helpers in this
//! module translate between both worlds.

/// Renders a number of bytes as a human readable size.
///
/// Sizes below one KiB are reported in plain bytes, everything above is scaled to the binary
/// unit (KiB up to PiB) which keeps roughly three significant digits.
///
/// # Examples
///
/// ```
/// assert_eq!(ganymede::fmt::format_size(0), "0 bytes");
/// assert_eq!(ganymede::fmt::format_size(1), "1 byte");
/// assert_eq!(ganymede::fmt::format_size(100), "100 bytes");
/// assert_eq!(ganymede::fmt::format_size(8_734), "8.53 KiB");
/// assert_eq!(ganymede::fmt::format_size(87_340), "85.3 KiB");
/// assert_eq!(ganymede::fmt::format_size(873_400), "853 KiB");
/// assert_eq!(ganymede::fmt::format_size(8_734_000), "8.33 MiB");
/// assert_eq!(ganymede::fmt::format_size(8_734_000_000), "8.13 GiB");
/// assert_eq!(ganymede::fmt::format_size(8_734_000_000_000), "7.94 TiB");
/// ```
pub fn format_size(size_in_bytes: usize) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if size_in_bytes < 1024 {
        return match size_in_bytes {
            1 => "1 byte".to_owned(),
            n => format!("{} bytes", n),
        };
    }

    let mut scaled = size_in_bytes as f32 / 1024.;
    let mut unit = 0;
    while scaled > 1024. && unit < UNITS.len() - 1 {
        scaled /= 1024.;
        unit += 1;
    }

    // Scale the precision so that roughly three significant digits remain...
    let decimals = if scaled <= 10. {
        2
    } else if scaled <= 100. {
        1
    } else {
        0
    };

    format!("{:.*} {}", decimals, scaled, UNITS[unit])
}

/// Parses a human readable memory size like `512`, `64k`, `8m`, `2g` or `1t`.
///
/// The suffix selects the binary magnitude (KiB, MiB, GiB or TiB) and may be given in upper
/// or lower case; whitespace around the number and the suffix is ignored. A bare number
/// (optionally with a `b` suffix) is taken as bytes. Anything else - fractions, negative
/// values, unknown suffixes - is rejected.
///
/// # Examples
///
/// ```
/// assert_eq!(ganymede::fmt::parse_size("100").unwrap(), 100);
/// assert_eq!(ganymede::fmt::parse_size("100b").unwrap(), 100);
/// assert_eq!(ganymede::fmt::parse_size("8k").unwrap(), 8192);
/// assert_eq!(ganymede::fmt::parse_size("8m").unwrap(), 8 * 1024 * 1024);
/// assert_eq!(ganymede::fmt::parse_size("4 G").unwrap(), 4 * 1024 * 1024 * 1024);
/// assert_eq!(ganymede::fmt::parse_size("3 T").unwrap(), 3 * 1024 * 1024 * 1024 * 1024);
///
/// // An unknown suffix is rejected...
/// assert_eq!(ganymede::fmt::parse_size("3 Y").is_err(), true);
///
/// // ...and so are fractions and negative values.
/// assert_eq!(ganymede::fmt::parse_size("1.2g").is_err(), true);
/// assert_eq!(ganymede::fmt::parse_size("-1").is_err(), true);
/// ```
pub fn parse_size(size: impl AsRef<str>) -> anyhow::Result<usize> {
    lazy_static::lazy_static! {
        static ref SIZE_EXPRESSION: regex::Regex =
            regex::Regex::new(r"^ *(\d+) *([bkmgtBKMGT]?) *$").unwrap();
    }

    let size = size.as_ref();
    let captures = SIZE_EXPRESSION.captures(size).ok_or_else(|| {
        anyhow::anyhow!(
            "Cannot parse '{}' as a memory size. Expected a positive number with an \
             optional 'b', 'k', 'm', 'g' or 't' suffix.",
            size
        )
    })?;

    let number = captures[1].parse::<usize>()?;
    let factor: usize = match captures[2].to_ascii_lowercase().as_str() {
        "k" => 1024,
        "m" => 1024 * 1024,
        "g" => 1024 * 1024 * 1024,
        "t" => 1024 * 1024 * 1024 * 1024,
        _ => 1,
    };

    Ok(number * factor)
}
