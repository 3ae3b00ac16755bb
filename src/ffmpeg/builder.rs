use crate::compress::EncodeJob;

use super::path_to_string;

/// FFmpeg arguments (without the binary) for one planned encode.
pub fn build_encode_args(job: &EncodeJob) -> Vec<String> {
    let settings = &job.settings;
    let plan = &job.plan;

    log::debug!(
        target: "vidpress::ffmpeg::builder",
        "Building FFmpeg command: codec={}, CRF={}, preset={}, plan={}, input={} -> output={}",
        settings.effective_codec(),
        settings.effective_crf(),
        settings.effective_preset(),
        plan,
        job.input.display(),
        job.output.display()
    );

    let mut args: Vec<String> = [
        "-nostdin",
        "-hide_banner",
        "-y",
        "-i",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.push(path_to_string(&job.input));

    args.extend([
        "-c:v".to_string(),
        settings.effective_codec().to_string(),
        "-preset".to_string(),
        settings.effective_preset().to_string(),
        "-crf".to_string(),
        settings.effective_crf().to_string(),
        "-b:v".to_string(),
        plan.bit_rate.to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", plan.width, plan.height),
        "-c:a".to_string(),
        settings.effective_audio_codec().to_string(),
        "-b:a".to_string(),
        format!("{}k", settings.effective_audio_bitrate()),
    ]);
    if settings.effective_faststart() {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args.push(path_to_string(&job.output));
    args
}

/// One option per line, with its value on the same line when it takes one.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    let mut lines = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        let takes_value = arg.starts_with('-')
            && iter.peek().is_some_and(|next| !next.starts_with('-'));
        if takes_value {
            if let Some(value) = iter.next() {
                lines.push(format!("  {} {}", arg, value));
                continue;
            }
        }
        lines.push(format!("  {}", arg));
    }
    lines.join("\n")
}
