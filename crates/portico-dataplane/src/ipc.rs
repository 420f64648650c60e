//! Arrow IPC stream encoding for tabular payloads.

use std::io::Cursor;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Encode a batch as an Arrow IPC stream (schema + one batch).
///
/// # Errors
///
/// Returns [`crate::DataPlaneError::Columnar`] if the writer fails.
pub fn encode_ipc(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = StreamWriter::try_new(&mut buf, batch.schema().as_ref())?;
    writer.write(batch)?;
    writer.finish()?;
    drop(writer);
    Ok(buf)
}

/// Decode Arrow IPC stream bytes into schema and record batches.
///
/// # Errors
///
/// Returns [`crate::DataPlaneError::Columnar`] on malformed input.
pub fn decode_ipc(ipc_bytes: &[u8]) -> Result<(Arc<Schema>, Vec<RecordBatch>)> {
    let reader = StreamReader::try_new(Cursor::new(ipc_bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}
