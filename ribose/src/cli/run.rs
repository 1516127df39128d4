use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::Arc,
};

use clap::Args;
use ribose_core::{BaseTarget, Signal};
use ribose_runtime::{IoOutput, Model, Output, Status, Transductor};

// RUN COMMAND
// ================================================================================================

#[derive(Args)]
pub struct RunCmd {
    /// Compiled model file.
    #[arg(long, short = 'm')]
    model: PathBuf,

    /// Transducer to start.
    transducer: String,

    /// Input file; stdin when omitted.
    input: Option<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Skip the nil prologue signal conventionally consumed first.
    #[arg(long)]
    no_nil: bool,
}

impl RunCmd {
    pub fn execute(&self) -> Result<(), String> {
        let model = Model::open(&self.model).map_err(|err| err.to_string())?;

        let sink: Box<dyn Output> = match &self.output {
            Some(path) => {
                let file = fs::File::create(path)
                    .map_err(|err| format!("cannot create {}: {err}", path.display()))?;
                Box::new(IoOutput(io::BufWriter::new(file)))
            },
            None => Box::new(IoOutput(io::stdout().lock())),
        };

        let input = match &self.input {
            Some(path) => fs::read(path)
                .map_err(|err| format!("cannot read {}: {err}", path.display()))?,
            None => {
                let mut bytes = Vec::new();
                io::stdin()
                    .read_to_end(&mut bytes)
                    .map_err(|err| format!("cannot read stdin: {err}"))?;
                bytes
            },
        };

        let mut transductor = Transductor::bind(Arc::new(model), BaseTarget, sink)
            .map_err(|err| err.to_string())?;
        transductor.start(&self.transducer).map_err(|err| err.to_string())?;
        if !self.no_nil {
            transductor.signal(Signal::NIL).map_err(|err| err.to_string())?;
        }
        transductor.push(&input, input.len());

        let mut sent_eos = false;
        let status = loop {
            let status = transductor.run().map_err(|err| err.to_string())?;
            if status == Status::Stopped {
                break status;
            }
            // a pause with input remaining resumes; at end of stream deliver eos once
            if transductor.status() == Status::Paused {
                if sent_eos {
                    break status;
                }
                transductor.signal(Signal::EOS).map_err(|err| err.to_string())?;
                sent_eos = true;
            }
        };
        let metrics = transductor.metrics();
        tracing::debug!(
            ?status,
            bytes_read = metrics.bytes_read,
            bytes_written = metrics.bytes_written,
            sum = metrics.sum.bytes,
            scan = metrics.scan.bytes,
            product = metrics.product.bytes,
            "transduction finished"
        );
        transductor.stop();
        Ok(())
    }
}
