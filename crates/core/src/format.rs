/// Format seconds as MM:SS, or H:MM:SS past the hour
pub fn format_timestamp(seconds: u32) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Parse a MM:SS or H:MM:SS marker into seconds
pub fn parse_timestamp(label: &str) -> Option<u32> {
    let parts = label
        .trim()
        .split(':')
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    match parts.as_slice() {
        [mins, secs] if *secs < 60 => mins.checked_mul(60)?.checked_add(*secs),
        [hours, mins, secs] if *mins < 60 && *secs < 60 => {
            hours.checked_mul(3600)?.checked_add(mins * 60 + secs)
        }
        _ => None,
    }
}
