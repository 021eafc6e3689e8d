//! Utility functions for the ooler-rust-ble crate.
//!
//! The device works in whole degrees, so conversions round to the nearest
//! integer (halves away from zero). A Celsius value converted to Fahrenheit
//! and back always returns the original value; the opposite direction can be
//! off by one because two Fahrenheit degrees may share a Celsius degree
//! (51 °F and 52 °F both map to 11 °C).

/// Convert Celsius to Fahrenheit, rounded to a whole degree.
///
/// # Example
///
/// ```
/// use ooler_rust_ble::celsius_to_fahrenheit;
///
/// assert_eq!(celsius_to_fahrenheit(10), 50);
/// assert_eq!(celsius_to_fahrenheit(-12), 10);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    (f64::from(celsius) * 1.8 + 32.0).round() as i32
}

/// Convert Fahrenheit to Celsius, rounded to a whole degree.
///
/// # Example
///
/// ```
/// use ooler_rust_ble::fahrenheit_to_celsius;
///
/// assert_eq!(fahrenheit_to_celsius(50), 10);
/// assert_eq!(fahrenheit_to_celsius(68), 20);
/// ```
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: i32) -> i32 {
    ((f64::from(fahrenheit) - 32.0) / 1.8).round() as i32
}
