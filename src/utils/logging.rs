use tracing::{debug, error, info, warn};

/// Logs the result of a participation attempt with consistent format
pub fn log_participation(kind: &str, entity_id: i64, user_id: i64, outcome: &str) {
    info!(
        "PARTICIPATION: {} {} user {} - {}",
        kind, entity_id, user_id, outcome
    );
}

/// Logs a committed draw with consistent format
pub fn log_draw(giveaway_id: i64, winners: usize, pool_size: usize) {
    info!(
        "DRAW: giveaway {} - {} winner(s) from {} participant(s)",
        giveaway_id, winners, pool_size
    );
}

/// Logs validation errors with consistent format
pub fn log_validation_error(operation: &str, error: &str) {
    debug!("VALIDATION_ERROR: {} - {}", operation, error);
}

/// Logs database operations with consistent format
pub fn log_database_operation(operation: &str, table: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("DB_OP: {} on {} - {}", operation, table, d),
        None => debug!("DB_OP: {} on {}", operation, table),
    }
}

/// Logs database errors with consistent format
pub fn log_database_error(operation: &str, table: &str, error: &str, details: Option<&str>) {
    match details {
        Some(d) => error!("DB_ERROR: {} on {} failed: {} - {}", operation, table, error, d),
        None => error!("DB_ERROR: {} on {} failed: {}", operation, table, error),
    }
}

/// Logs a retry of a transient storage failure
pub fn log_retry(operation: &str, attempt: u32, max_attempts: u32, error: &str) {
    warn!(
        "RETRY: {} attempt {}/{} failed: {}",
        operation, attempt, max_attempts, error
    );
}

/// Logs a failed best-effort delivery
pub fn log_delivery_failure(recipient: &str, error: &str) {
    warn!("DELIVERY_FAILED: {} - {}", recipient, error);
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
