use std::sync::Arc;

use tracing::info;
use typecodec::{
    ObjectMapper, Registry, TypeSignature, Value,
    codecs::{BinaryCodec, NaiveCodec},
    streaming::spawn_streaming_processor,
};

#[tokio::main]
async fn main() -> typecodec::Result<()> {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(Registry::with_defaults());
    let json = ObjectMapper::new(NaiveCodec {}, Arc::clone(&registry));
    let binary = ObjectMapper::new(BinaryCodec {}, Arc::clone(&registry));

    let ty = TypeSignature::map(TypeSignature::sequence(TypeSignature::DOUBLE));
    let value = Value::Map(vec![
        (
            "temperatures".to_string(),
            Value::Sequence(vec![Value::Double(21.5), Value::Double(19.0)]),
        ),
        ("pressure".to_string(), Value::Sequence(vec![])),
    ]);

    let bytes = json.write_value_as_bytes_typed(&ty, &value)?;
    info!(json = %String::from_utf8_lossy(&bytes), "Encoded");
    assert_eq!(json.read_value(&bytes, &ty)?, value);

    let packed = binary.write_value_as_bytes_typed(&ty, &value)?;
    info!(len = packed.len(), "Encoded as MessagePack");
    assert_eq!(binary.read_value(&packed, &ty)?, value);

    let (tx, rx) = spawn_streaming_processor(json.create_streaming_processor(true));
    let chunks: [&[u8]; 2] = [br#"[{"id": 1}, {"id""#, br#": 2}]"#];
    for chunk in chunks {
        if tx.send(chunk.to_vec()).await.is_err() {
            break;
        }
    }
    drop(tx);

    while let Ok(node) = rx.recv().await {
        let element = json.read_value_from_tree(&node?, &TypeSignature::map(TypeSignature::INT))?;
        info!(?element, "Streamed element");
    }

    info!(resolutions = registry.resolutions(), "Done");
    Ok(())
}
