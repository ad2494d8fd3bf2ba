//! TIME dimension handling.
//!
//! A TIME value is a discrete instant (`2004-09-21`), a comma list of
//! instants, or a comma list of `start/end` ranges, at any granularity from
//! bare years down to seconds. Layers advertise their extent with the same
//! syntax in `wms_timeextent` metadata and are filtered over their
//! `wms_timeitem` attribute.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use map_config::{Expression, ExpressionKind, Layer, LayerStatus, MapConfig};

use crate::error::WmsError;

/// One time token expanded to the instant span it covers at its granularity
/// (e.g. `2004-06` covers all of June 2004).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    fn contains(&self, other: &TimeSpan) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// Parse a single instant token, returning the span it covers.
///
/// Accepted granularities: `%Y`, `%Y-%m`, `%Y-%m-%d`, then `T%H`, `:%M`,
/// `:%S` with an optional trailing `Z`.
pub fn parse_time_token(token: &str) -> Option<TimeSpan> {
    let token = token.trim();
    let token = token.strip_suffix('Z').unwrap_or(token);

    if let Ok(dt) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S") {
        let start = Utc.from_utc_datetime(&dt);
        return Some(TimeSpan {
            start,
            end: start + Duration::seconds(1) - Duration::nanoseconds(1),
        });
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M") {
        let start = Utc.from_utc_datetime(&dt);
        return Some(TimeSpan {
            start,
            end: start + Duration::minutes(1) - Duration::nanoseconds(1),
        });
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H") {
        let start = Utc.from_utc_datetime(&dt);
        return Some(TimeSpan {
            start,
            end: start + Duration::hours(1) - Duration::nanoseconds(1),
        });
    }
    if let Ok(d) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        let start = Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?);
        return Some(TimeSpan {
            start,
            end: start + Duration::days(1) - Duration::nanoseconds(1),
        });
    }
    // year-month
    if let Some((y, m)) = split_year_month(token) {
        let start = Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)?);
        let next = if m == 12 {
            NaiveDate::from_ymd_opt(y + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(y, m + 1, 1)?
        };
        return Some(TimeSpan {
            start,
            end: Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?) - Duration::nanoseconds(1),
        });
    }
    // bare year
    if token.len() == 4 {
        if let Ok(y) = token.parse::<i32>() {
            let start =
                Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(y, 1, 1)?.and_hms_opt(0, 0, 0)?);
            let end = Utc
                .from_utc_datetime(&NaiveDate::from_ymd_opt(y + 1, 1, 1)?.and_hms_opt(0, 0, 0)?)
                - Duration::nanoseconds(1);
            return Some(TimeSpan { start, end });
        }
    }
    None
}

fn split_year_month(token: &str) -> Option<(i32, u32)> {
    let (y, m) = token.split_once('-')?;
    if m.contains('-') {
        return None;
    }
    Some((y.parse().ok()?, m.parse().ok()?))
}

/// Parse one element of a TIME value or extent: an instant or a
/// `start/end[/resolution]` range (the resolution is ignored).
fn parse_element(element: &str) -> Option<TimeSpan> {
    let parts: Vec<&str> = element.split('/').collect();
    match parts.len() {
        1 => parse_time_token(parts[0]),
        2 | 3 => {
            let start = parse_time_token(parts[0])?;
            let end = parse_time_token(parts[1])?;
            Some(TimeSpan {
                start: start.start,
                end: end.end,
            })
        }
        _ => None,
    }
}

/// Check that every element of `value` falls inside the layer's advertised
/// `extent`. Malformed values are invalid.
pub fn validate_time_value(value: &str, extent: &str) -> bool {
    let extent_spans: Vec<TimeSpan> = extent
        .split(',')
        .filter_map(parse_element)
        .collect();
    if extent_spans.is_empty() {
        return false;
    }

    for element in value.split(',') {
        match parse_element(element) {
            Some(span) => {
                if !extent_spans.iter().any(|e| e.contains(&span)) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Build the data filter expression for a resolved time value over
/// `timeitem`.
fn time_filter_expression(value: &str, timeitem: &str) -> Expression {
    let mut clauses: Vec<String> = Vec::new();
    for element in value.split(',') {
        let element = element.trim();
        match element.split_once('/') {
            Some((start, end)) => clauses.push(format!(
                "(([{}] >= `{}`) AND ([{}] <= `{}`))",
                timeitem,
                start.trim(),
                timeitem,
                end.split('/').next().unwrap_or(end).trim()
            )),
            None => clauses.push(format!("([{}] = `{}`)", timeitem, element)),
        }
    }
    Expression::new(
        if clauses.len() == 1 {
            clauses.pop().unwrap()
        } else {
            format!("({})", clauses.join(" OR "))
        },
        ExpressionKind::Logical,
    )
}

fn set_time_filter(layer: &mut Layer, value: &str, timeitem: &str) {
    layer.filter = time_filter_expression(value, timeitem);
    layer.filter_item = Some(timeitem.to_string());
}

/// Apply the TIME parameter to every time-aware ON/DEFAULT layer.
///
/// Resolution order per layer: the request value when given and valid, the
/// layer's `wms_timedefault` otherwise. A missing value with no default is
/// `MissingDimensionValue`; a value (or default) outside the extent is
/// `InvalidDimensionValue`.
pub fn apply_time(map: &mut MapConfig, time: Option<&str>) -> Result<(), WmsError> {
    let time = time.filter(|t| !t.is_empty());

    for i in 0..map.layers.len() {
        let layer = &map.layers[i];
        if layer.status != LayerStatus::On && layer.status != LayerStatus::Default {
            continue;
        }
        let Some(extent) = layer.metadata.ows_lookup("MO", "timeextent").map(str::to_string)
        else {
            continue;
        };
        let Some(timeitem) = layer.metadata.ows_lookup("MO", "timeitem").map(str::to_string)
        else {
            continue;
        };
        let timedefault = layer
            .metadata
            .ows_lookup("MO", "timedefault")
            .map(str::to_string);

        match time {
            None => match &timedefault {
                None => {
                    return Err(WmsError::MissingDimension(
                        "No Time value was given, and no default time value defined.".to_string(),
                    ))
                }
                Some(default) => {
                    if !validate_time_value(default, &extent) {
                        return Err(WmsError::InvalidDimension(format!(
                            "No Time value was given, and the default time value {} is invalid \
                             or outside the time extent defined {}",
                            default, extent
                        )));
                    }
                    set_time_filter(&mut map.layers[i], default, &timeitem);
                }
            },
            Some(value) => {
                if validate_time_value(value, &extent) {
                    set_time_filter(&mut map.layers[i], value, &timeitem);
                } else {
                    match &timedefault {
                        None => {
                            return Err(WmsError::InvalidDimension(format!(
                                "Time value(s) {} given is invalid or outside the time extent \
                                 defined ({}).",
                                value, extent
                            )))
                        }
                        Some(default) => {
                            if !validate_time_value(default, &extent) {
                                return Err(WmsError::InvalidDimension(format!(
                                    "Time value(s) {} given is invalid or outside the time \
                                     extent defined ({}), and default time set is invalid ({})",
                                    value, extent, default
                                )));
                            }
                            set_time_filter(&mut map.layers[i], default, &timeitem);
                        }
                    }
                }
            }
        }
    }

    // select the request's time pattern from the map-wide pattern list
    if let Some(value) = time {
        if let Some(patterns) = map
            .web
            .metadata
            .ows_lookup("MO", "timeformat")
            .map(str::to_string)
        {
            select_time_pattern(map, &patterns, value);
        }
    }

    Ok(())
}

/// Pick the first pattern matched by the value's leading instant and record
/// it on the request's map copy.
///
/// Lists take their first element, ranges their start.
pub fn select_time_pattern(map: &mut MapConfig, patterns: &str, time: &str) {
    let first = time.split(',').next().unwrap_or(time);
    let instant = first.split('/').next().unwrap_or(first).trim();

    for pattern in patterns.split(',') {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        if time_matches_pattern(instant, pattern) {
            map.time_pattern = Some(pattern.to_string());
            break;
        }
    }
}

/// Whether `value` fully matches a strftime-style `pattern`.
fn time_matches_pattern(value: &str, pattern: &str) -> bool {
    let mut parsed = chrono::format::Parsed::new();
    chrono::format::parse(
        &mut parsed,
        value,
        chrono::format::StrftimeItems::new(pattern),
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_granularities() {
        assert!(parse_time_token("2004").is_some());
        assert!(parse_time_token("2004-09").is_some());
        assert!(parse_time_token("2004-09-21").is_some());
        assert!(parse_time_token("2004-09-21T14").is_some());
        assert!(parse_time_token("2004-09-21T14:30").is_some());
        assert!(parse_time_token("2004-09-21T14:30:15Z").is_some());
        assert!(parse_time_token("tuesday").is_none());
    }

    #[test]
    fn test_validate_single_in_range() {
        assert!(validate_time_value("2004-06-01", "2004-01-01/2004-12-31"));
        assert!(!validate_time_value("2005-06-01", "2004-01-01/2004-12-31"));
    }

    #[test]
    fn test_validate_list_and_ranges() {
        assert!(validate_time_value(
            "2004-02-03,2004-03-04",
            "2004-01-01/2004-12-31"
        ));
        assert!(validate_time_value(
            "2004-02-01/2004-02-10",
            "2004-01-01/2004-12-31"
        ));
        assert!(!validate_time_value(
            "2004-02-03,2005-03-04",
            "2004-01-01/2004-12-31"
        ));
    }

    #[test]
    fn test_validate_discrete_extent() {
        assert!(validate_time_value("2004-09-21", "2004-09-20,2004-09-21"));
        assert!(!validate_time_value("2004-09-22", "2004-09-20,2004-09-21"));
    }

    #[test]
    fn test_month_granularity_containment() {
        assert!(validate_time_value("2004-06", "2004-01/2004-12"));
        assert!(!validate_time_value("2004-06", "2004-06-02/2004-06-30"));
    }

    #[test]
    fn test_filter_expression_shapes() {
        let single = time_filter_expression("2004-06-01", "obs_date");
        assert_eq!(
            single.string.as_deref(),
            Some("([obs_date] = `2004-06-01`)")
        );
        let range = time_filter_expression("2004-06-01/2004-06-30", "obs_date");
        assert_eq!(
            range.string.as_deref(),
            Some("(([obs_date] >= `2004-06-01`) AND ([obs_date] <= `2004-06-30`))")
        );
    }

    #[test]
    fn test_pattern_selection_extracts_first_instant() {
        let mut map = MapConfig::new("demo");
        select_time_pattern(
            &mut map,
            "%Y-%m-%dT%H:%M:%S, %Y-%m-%d, %Y",
            "2004-09-21/2004-09-25,2004-09-27/2004-09-29",
        );
        assert_eq!(map.time_pattern.as_deref(), Some("%Y-%m-%d"));
    }
}
