//! `imgscope layers` command.

use clap::Args;
use comfy_table::Table;
use imgscope_core::ProcessingOption;
use imgscope_runtime::Image;

use crate::output;

#[derive(Args)]
pub struct LayersArgs {
    /// Image to read
    pub image: String,
}

pub fn execute(args: LayersArgs) -> Result<(), Box<dyn std::error::Error>> {
    let image = imgscope_runtime::get_image(&args.image, &[ProcessingOption::ReadImage])?;
    println!("{}", layer_table(&image));
    Ok(())
}

fn layer_table(image: &Image) -> Table {
    let mut table = output::new_table(&["INDEX", "DIGEST", "MEDIA TYPE", "SIZE", "FILES"]);
    for layer in image.layers() {
        table.add_row(vec![
            layer.index.to_string(),
            output::short_digest(&layer.digest),
            layer.media_type.clone(),
            output::format_size(layer.size),
            layer.file_count.to_string(),
        ]);
    }
    table
}
