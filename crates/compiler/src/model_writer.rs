use std::io::{self, Seek, SeekFrom, Write};

use ribose_core::{
    MODEL_VERSION, ModelIndex, ModelPreamble, Signal, TransducerEntry, utils::Serializable,
};

use crate::compiler::CompiledModel;

// MODEL WRITER
// ================================================================================================

/// Writes a compiled model: preamble with a placeholder index offset, transducer records at
/// recorded offsets, the index block, and finally the rewritten preamble offset.
pub fn write_model<W: Write + Seek>(
    model: &CompiledModel,
    target_name: &str,
    out: &mut W,
) -> io::Result<()> {
    let preamble = ModelPreamble {
        index_offset: 0,
        version: MODEL_VERSION.to_string(),
        target_name: target_name.to_string(),
    };
    out.write_all(&preamble.to_bytes())?;

    let mut entries = Vec::with_capacity(model.transducers.len());
    for transducer in &model.transducers {
        let offset = out.stream_position()?;
        entries.push(TransducerEntry {
            name: transducer.name().to_string(),
            offset,
        });
        out.write_all(&transducer.to_bytes())?;
    }

    let index_offset = out.stream_position()?;
    let index = ModelIndex {
        maps: model.maps.clone(),
        transducers: entries,
        parameters: model.parameters.clone(),
    };
    out.write_all(&index.to_bytes())?;

    out.seek(SeekFrom::Start(0))?;
    out.write_all(&index_offset.to_be_bytes())?;
    out.flush()
}

// MAP FILE WRITER
// ================================================================================================

/// Writes the companion `.map` file: tab-separated name/ordinal records for every namespace
/// (user-declared signals only).
pub fn write_map<W: Write>(model: &CompiledModel, target_name: &str, out: &mut W) -> io::Result<()> {
    writeln!(out, "version\t{MODEL_VERSION}")?;
    writeln!(out, "target\t{target_name}")?;
    for (ordinal, name) in model.maps.transducers.iter() {
        writeln!(out, "transducer\t{}\t{ordinal}", String::from_utf8_lossy(name))?;
    }
    let user_signal_base = Signal::EOS.as_u32() + 1;
    for (ordinal, name) in model.maps.signals.iter() {
        if ordinal >= user_signal_base {
            writeln!(out, "signal\t{}\t{ordinal}", String::from_utf8_lossy(name))?;
        }
    }
    for (ordinal, name) in model.maps.effectors.iter() {
        writeln!(out, "effector\t{}\t{ordinal}", String::from_utf8_lossy(name))?;
    }
    for (ordinal, name) in model.maps.fields.iter() {
        writeln!(out, "field\t{}\t{ordinal}", String::from_utf8_lossy(name))?;
    }
    Ok(())
}
