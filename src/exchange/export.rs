use crate::exchange::{ExchangeError, ExchangeRecord};
use crate::store::ContentStore;
use std::io::Write;

/// Writes the whole catalog to `writer` as a JSON array
///
/// Records are serialized one at a time while the catalog is paged through,
/// so memory use does not grow with the catalog. Returns the number of
/// records written.
pub fn export_json<W: Write>(store: &ContentStore, mut writer: W) -> Result<usize, ExchangeError> {
    writer.write_all(b"[")?;

    let mut written = 0;
    for article in store.export_all() {
        let record = ExchangeRecord::from(&article?);
        if written > 0 {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut writer, &record).map_err(std::io::Error::from)?;
        written += 1;
    }

    writer.write_all(b"]")?;
    writer.flush()?;

    tracing::info!("Exported {} records", written);
    Ok(written)
}
