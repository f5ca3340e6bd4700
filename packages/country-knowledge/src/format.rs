//! Turning lookup outcomes into chat replies.

use tracing::{debug, info};

use crate::error::LookupError;
use crate::lookup::{LookupService, PopulationState};
use crate::types::record::{AliasRecord, EntityRecord, Field, Resolution};

pub const WELCOME: &str = "Привет! Я могу помочь найти:\n\
1. Столицу по названию страны\n\
2. Страну по названию города/столицы\n\n\
Просто отправьте название страны или города.";

pub const PLEASE_WAIT: &str = "Пожалуйста, подождите. Загружаю информацию о странах...";

pub const NOT_FOUND: &str = "Извините, не могу найти информацию об этой стране или городе. \
Проверьте правильность написания.";

pub const UNAVAILABLE: &str =
    "Информация о странах временно недоступна. Попробуйте позже.";

/// Full reply for an entity.
pub fn format_entity(entity: &EntityRecord) -> String {
    let mut lines = vec![
        format!("Страна: {}", entity.display_name),
        format!("Столица: {}", entity.capital),
    ];
    for field in Field::ALL {
        lines.push(format!("{}: {}", field.label(), entity.fields.get(field)));
    }
    format!(
        "{}\n\nКраткая информация:\n{}",
        lines.join("\n"),
        entity.summary
    )
}

/// One-line reply for a capital.
pub fn format_alias(alias: &AliasRecord, entity: &EntityRecord) -> String {
    format!(
        "Город {} является столицей страны: {}",
        alias.display, entity.display_name
    )
}

pub fn format_resolution(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Entity(entity) => format_entity(entity),
        Resolution::Alias { alias, entity } => format_alias(alias, entity),
    }
}

/// User-facing text for a failed lookup.
pub fn format_error(error: &LookupError) -> &'static str {
    match error {
        LookupError::NotFound { .. } | LookupError::BrokenAlias { .. } => NOT_FOUND,
        LookupError::Populating => PLEASE_WAIT,
        LookupError::PopulationFailed { .. } | LookupError::Cancelled => UNAVAILABLE,
    }
}

/// `/start` and `/help`, with or without a `@botname` suffix.
fn is_help_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    matches!(command, "/start" | "/help")
}

/// Answers chat messages from the lookup service.
#[derive(Clone)]
pub struct QueryHandler {
    service: LookupService,
}

impl QueryHandler {
    pub fn new(service: LookupService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &LookupService {
        &self.service
    }

    /// Reply text for one incoming message. Never fails.
    pub async fn handle_query(&self, raw: &str) -> String {
        let text = raw.trim();
        if is_help_command(text) {
            return self.welcome();
        }

        match self.service.lookup(text).await {
            Ok(resolution) => {
                debug!(query = %text, alias = resolution.is_alias(), "Query answered");
                format_resolution(&resolution)
            }
            Err(e) => {
                if e.is_not_found() {
                    info!(query = %text, "Nothing known for query");
                } else {
                    debug!(query = %text, error = %e, "Query failed");
                }
                format_error(&e).to_string()
            }
        }
    }

    /// Usage text; starts population in the background on an empty store.
    fn welcome(&self) -> String {
        self.service.start_population();
        if self.service.state() == PopulationState::Populating {
            format!("{}\n\n{}", PLEASE_WAIT, WELCOME)
        } else {
            WELCOME.to_string()
        }
    }
}
