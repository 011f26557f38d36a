//! Importers shipped with the crate. Mapping tables are plain data consumed
//! by the generic steps.

pub mod generic;
pub mod paypal;
pub mod unicredit;

use std::sync::Arc;

use crate::importer::{ImportError, Importer};
use crate::registry::ImporterRegistry;

type BuiltinFactory = fn() -> Result<Arc<dyn Importer>, ImportError>;

pub(crate) fn register_builtin(registry: &mut ImporterRegistry) {
    let builtin: [(_, BuiltinFactory); 3] = [
        (generic::info(), generic::importer),
        (unicredit::info(), unicredit::importer),
        (paypal::info(), paypal::importer),
    ];
    for (info, factory) in builtin {
        let id = info.id.clone();
        if let Err(err) = registry.register(info, factory) {
            tracing::warn!(importer = %id, error = %err, "skipping builtin importer");
        }
    }
}
