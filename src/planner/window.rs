//! Window clause fragments for fact queries.
//!
//! All interval arithmetic is symbolic text against the exposure join;
//! nothing is evaluated here. Delay and window units are independent
//! and never auto-converted.

use crate::metric::{TimeUnit, WindowSettings, WindowType};
use crate::sql::{func, name, raw_sql, ExprExt, Predicate};

/// Render `INTERVAL '<n> <unit>'` with a singular unit at one.
fn interval(value: u32, unit: TimeUnit) -> String {
    format!("INTERVAL '{} {}'", value, unit.label(value))
}

/// Build the window predicates for one fact query.
///
/// There is always an "after exposure" lower bound. Retention metrics
/// include the delay term even at zero, so a freshly exposed user does
/// not count as retained; other types only mention the delay when it
/// is non-zero.
pub fn window_predicates(settings: &WindowSettings, always_delay: bool) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    let delayed = always_delay || settings.delay_value > 0;
    let after_exposure = if delayed {
        Predicate::new(name("timestamp").gt(name("exposure_timestamp").add(raw_sql(&interval(
            settings.delay_value,
            settings.delay_unit,
        )))))
        .with_comment("Only after seeing the experiment + delay")
    } else {
        Predicate::new(name("timestamp").gt(name("exposure_timestamp")))
            .with_comment("Only after seeing the experiment")
    };
    predicates.push(after_exposure);

    match settings.window_type {
        WindowType::None => {}
        WindowType::Lookback => {
            predicates.push(
                Predicate::new(name("timestamp").gt(func("NOW", vec![]).sub(raw_sql(&interval(
                    settings.window_value,
                    settings.window_unit,
                )))))
                .with_comment("Only within the lookback window"),
            );
        }
        WindowType::Conversion => {
            let mut upper = name("exposure_timestamp");
            if delayed {
                upper = upper.add(raw_sql(&interval(settings.delay_value, settings.delay_unit)));
            }
            upper = upper.add(raw_sql(&interval(settings.window_value, settings.window_unit)));
            predicates.push(
                Predicate::new(name("timestamp").lt(upper))
                    .with_comment("Only within the conversion window"),
            );
        }
    }

    predicates
}
