use std::path::Path;

use anyhow::{Context, Result};
#[allow(unused_imports)]
use ort::{
    ep::{self, ExecutionProvider},
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
};

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

/// Load the feature-extraction network (ResNet-50 without its classifier head).
pub fn encoder_session(path: &Path) -> Result<Session> {
    anyhow::ensure!(
        path.is_file(),
        "ONNX model not found at {}",
        path.display()
    );
    let session = session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load encoder model {}", path.display()))?;
    log::info!("Loaded encoder model {}", path.display());
    Ok(session)
}
