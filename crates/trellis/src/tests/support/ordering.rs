//! Initializers that make ordering dependencies observable.

use crate::container::{FactoryError, Lifetime, ServiceContainer};
use crate::initializers::{InitializerError, InitializerTable};

/// Service with no dependencies.
pub const ALPHA: &str = "alpha";
/// Service that depends on [`ALPHA`].
pub const BETA: &str = "beta";

fn init_alpha(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(ALPHA, Lifetime::Shared, |_| {
        Ok::<_, FactoryError>(String::from(ALPHA))
    });
    Ok(())
}

fn init_eager_beta(container: &ServiceContainer) -> Result<(), InitializerError> {
    let alpha = container.resolve_as::<String>(ALPHA)?;
    container.register_instance(BETA, format!("{BETA} after {alpha}"));
    Ok(())
}

fn init_lazy_beta(container: &ServiceContainer) -> Result<(), InitializerError> {
    container.register_fn(
        BETA,
        Lifetime::Shared,
        |services| -> Result<String, FactoryError> {
            let alpha = services.resolve_as::<String>(ALPHA)?;
            Ok(format!("{BETA} after {alpha}"))
        },
    );
    Ok(())
}

/// Table with `alpha`, `eager_beta` and `lazy_beta` initializers on top of
/// the built-in ones.
#[must_use]
pub fn ordering_table() -> InitializerTable {
    InitializerTable::builtin()
        .with(ALPHA, init_alpha)
        .with("eager_beta", init_eager_beta)
        .with("lazy_beta", init_lazy_beta)
}
