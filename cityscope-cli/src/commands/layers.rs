//! `cityscope layers` - print the built-in layer catalog.

use cityscope::catalog::LayerCatalog;

use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    let catalog = LayerCatalog::builtin();

    println!("{:<20} {:<14} {:<14} Overpass filter", "Layer", "Domain", "Icon");
    println!("{}", "-".repeat(72));
    for layer in catalog.iter() {
        println!(
            "{:<20} {:<14} {:<14} {}",
            layer.name,
            layer.domain,
            layer.icon,
            layer.predicate.to_overpass()
        );
    }
    println!();
    println!("{} layers", catalog.len());

    Ok(())
}
