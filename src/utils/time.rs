/// Formats seconds as `mm:ss`, truncating fractions. Minutes grow past two digits as needed.
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.floor() as i64;
    let minutes = seconds.div_euclid(60);
    let remainder = seconds.rem_euclid(60);
    format!("{:02}:{:02}", minutes, remainder)
}
