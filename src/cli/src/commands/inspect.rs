//! `imgscope inspect` command: display image metadata as JSON.

use clap::Args;
use imgscope_core::ProcessingOption;
use imgscope_runtime::Image;

#[derive(Args)]
pub struct InspectArgs {
    /// Image to inspect (reference, tarball or OCI layout, optionally
    /// prefixed with a source scheme such as `oci-dir:`)
    pub image: String,

    /// Skip reading layer contents
    #[arg(long)]
    pub no_read: bool,
}

pub fn execute(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let option = if args.no_read {
        ProcessingOption::NoAction
    } else {
        ProcessingOption::ReadImage
    };
    let image = imgscope_runtime::get_image(&args.image, &[option])?;

    println!("{}", serde_json::to_string_pretty(&render(&image))?);
    Ok(())
}

fn render(image: &Image) -> serde_json::Value {
    let metadata = image.metadata();
    let config = image.config();

    let env_map: serde_json::Map<String, serde_json::Value> = config
        .env
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();

    let layers: Vec<serde_json::Value> = image
        .layers()
        .iter()
        .map(|layer| {
            serde_json::json!({
                "Digest": layer.digest,
                "DiffId": layer.diff_id,
                "MediaType": layer.media_type,
                "Size": layer.size,
                "Files": layer.is_read().then_some(layer.file_count),
            })
        })
        .collect();

    serde_json::json!({
        "Source": image.source().to_string(),
        "Location": image.locator(),
        "Id": metadata.id,
        "ManifestDigest": metadata.manifest_digest,
        "Tags": metadata.tags,
        "Architecture": metadata.architecture,
        "Os": metadata.os,
        "Size": image.size(),
        "Read": image.is_read(),
        "Config": {
            "Entrypoint": config.entrypoint,
            "Cmd": config.cmd,
            "Env": env_map,
            "WorkingDir": config.working_dir,
            "User": config.user,
            "ExposedPorts": config.exposed_ports,
            "Labels": config.labels,
        },
        "Layers": layers,
    })
}
