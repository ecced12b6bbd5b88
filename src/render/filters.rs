use crate::calibration::store::CalibrationRecord;
use crate::config::RenderConfig;

/// The assembled `-filter_complex` graph plus the label its final frame
/// leaves on.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub filter_complex: String,
    pub output_label: String,
}

impl FilterGraph {
    pub fn build_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-filter_complex".to_string(),
            self.filter_complex.clone(),
            "-map".to_string(),
            self.output_label.clone(),
        ]
    }
}

/// One eye's processing chain: center square crop nudged by the stored
/// pixel offsets, rotation by the stored angles, then scale to the output
/// eye size. The record's own signs are used as-is; the right record
/// already carries the mirrored values.
fn eye_chain(input_label: &str, record: &CalibrationRecord, config: &RenderConfig, out_label: &str) -> String {
    let mut filters = Vec::new();

    // Moving the crop window opposite to the offset shifts the image the
    // way the preview did.
    filters.push(format!(
        "crop='min(iw,ih)':'min(iw,ih)':'(iw-min(iw,ih))/2-({})':'(ih-min(iw,ih))/2-({})'",
        record.x_offset, record.y_offset
    ));

    let angle = record.rotation_global + record.rotation_local;
    if angle != 0.0 {
        filters.push(format!("rotate=({})*PI/180", angle));
    }

    filters.push(format!("scale={}:{}", config.eye_edge, config.eye_edge));

    format!("[{}]{}[{}]", input_label, filters.join(","), out_label)
}

/// Builds the full graph: per-eye chains, horizontal stack, and the
/// optional fisheye-to-equirectangular re-projection.
pub fn build_filter_graph(
    left: &CalibrationRecord,
    right: &CalibrationRecord,
    config: &RenderConfig,
) -> FilterGraph {
    let mut stages = vec![
        eye_chain("0:v", left, config, "lefteye"),
        eye_chain("1:v", right, config, "righteye"),
        "[lefteye][righteye]hstack=inputs=2[sbs]".to_string(),
    ];

    let output_label = if config.dewarp {
        stages.push(format!(
            "[sbs]v360=input=fisheye:output=equirect:in_stereo=sbs:out_stereo=sbs:ih_fov={fov}:iv_fov={fov}:h_fov=180:v_fov=180[vr]",
            fov = config.fov_degrees
        ));
        "[vr]".to_string()
    } else {
        "[sbs]".to_string()
    };

    FilterGraph {
        filter_complex: stages.join(";"),
        output_label,
    }
}
