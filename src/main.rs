use clap::{Parser, Subcommand, ValueEnum};
use rasterfx::buffer::{Buffer, ColorMode, Image};
use rasterfx::config::Config;
use rasterfx::convert::{Dither, convert};
use rasterfx::filter::{FilterContext, apply_image};
use rasterfx::kernel::{KernelRegistry, KernelSources, Target};
use rasterfx::palette::{NearestColorTable, Palette};
use rasterfx::pixel::{graya_a, graya_k, rgba, rgba_a, rgba_b, rgba_g, rgba_r};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "rasterfx")]
#[command(about = "Palette-aware quantization, dithering, and convolution filters for PNG images")]
#[command(long_about = "\
Palette-aware quantization, dithering, and convolution filters for PNG images

Kernels come from plain-text stock files, merged in priority order:

  kernels.usr    # your kernels
  kernels.gen    # general-purpose kernels
  kernels.def    # default stock (built in; a file on disk overrides it)

each resolved against the directories in rasterfx.toml's kernel_dirs.
Record format:

  <name> <w> <h> <cx> <cy> { <w*h weights> } <divisor|auto> <bias|auto> <targets>

Palettes are TOML files with 6-bit channel entries:

  entries = [[0, 0, 0], [63, 0, 0], [0, 63, 0]]

Run 'rasterfx kernels' to see what's loaded.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: rasterfx.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Palette file; overrides the config and the built-in palette
    #[arg(long, global = true)]
    palette: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum DitherArg {
    /// Plain nearest-match quantization
    None,
    /// 8x8 Bayer ordered dithering
    Ordered,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Rgba,
    Gray,
    Indexed,
}

#[derive(Subcommand)]
enum Command {
    /// List the kernels resolved from the stock files
    Kernels {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
    /// Apply a named convolution kernel to a PNG
    Filter {
        /// Kernel name from the stock files
        #[arg(long)]
        kernel: String,
        /// Wrap around image edges instead of clamping
        #[arg(long)]
        tiled: bool,
        /// Target channels (letters r, g, b, a); the kernel's default if omitted
        #[arg(long)]
        channels: Option<String>,
        input: PathBuf,
        output: PathBuf,
    },
    /// Quantize a PNG to the palette
    Quantize {
        #[arg(long, value_enum, default_value = "ordered")]
        dither: DitherArg,
        input: PathBuf,
        output: PathBuf,
    },
    /// Convert a PNG between color modes
    Convert {
        #[arg(long, value_enum)]
        to: ModeArg,
        #[arg(long, value_enum, default_value = "none")]
        dither: DitherArg,
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let palette = match cli.palette.as_deref().or(config.palette.as_deref()) {
        Some(path) => Palette::from_toml_file(path)?,
        None => Palette::default_vga(),
    };
    let table = NearestColorTable::build(&palette);

    match cli.command {
        Command::Kernels { json } => {
            let registry = load_registry(&config);
            if json {
                let entries: Vec<serde_json::Value> = registry
                    .iter()
                    .map(|k| {
                        serde_json::json!({
                            "name": k.name(),
                            "width": k.width(),
                            "height": k.height(),
                            "center": [k.center().0, k.center().1],
                            "divisor": k.div(),
                            "bias": k.bias(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for k in registry.iter() {
                    println!("{:12} {}x{}", k.name(), k.width(), k.height());
                }
            }
        }
        Command::Filter {
            kernel,
            tiled,
            channels,
            input,
            output,
        } => {
            let registry = load_registry(&config);
            let k = registry
                .get(&kernel)
                .ok_or_else(|| format!("no kernel named '{kernel}' in the stock files"))?;
            let target = match channels {
                Some(letters) => parse_channels(&letters),
                None => k.default_target(),
            };
            let ctx = FilterContext::new(k, tiled || config.tiled);
            let src = Image::Rgba(load_png(&input)?);
            let dst = apply_image(Some(&ctx), &src, target, None, &palette, &table);
            save_image(&dst, &palette, &output)?;
            println!("{} -> {} ({kernel})", input.display(), output.display());
        }
        Command::Quantize {
            dither,
            input,
            output,
        } => {
            let src = Image::Rgba(load_png(&input)?);
            let dst = convert(&src, ColorMode::Indexed, dither.into(), &table, &palette)
                .ok_or("input is already indexed")?;
            save_image(&dst, &palette, &output)?;
            println!("{} -> {}", input.display(), output.display());
        }
        Command::Convert {
            to,
            dither,
            input,
            output,
        } => {
            let src = Image::Rgba(load_png(&input)?);
            let target = match to {
                ModeArg::Rgba => ColorMode::Rgba,
                ModeArg::Gray => ColorMode::GrayAlpha,
                ModeArg::Indexed => ColorMode::Indexed,
            };
            // Same-mode conversion is a no-op; fall back to the source.
            let dst = convert(&src, target, dither.into(), &table, &palette).unwrap_or(src);
            save_image(&dst, &palette, &output)?;
            println!("{} -> {}", input.display(), output.display());
        }
    }

    Ok(())
}

impl From<DitherArg> for Dither {
    fn from(arg: DitherArg) -> Self {
        match arg {
            DitherArg::None => Dither::None,
            DitherArg::Ordered => Dither::Ordered,
        }
    }
}

fn load_registry(config: &Config) -> KernelRegistry {
    KernelRegistry::load(&KernelSources::new(config.kernel_dirs.clone()))
}

fn parse_channels(letters: &str) -> Target {
    let mut target = Target::default();
    for ch in letters.chars() {
        match ch.to_ascii_lowercase() {
            'r' => target.r = true,
            'g' => target.g = true,
            'b' => target.b = true,
            'a' => target.a = true,
            _ => {}
        }
    }
    target
}

fn load_png(path: &Path) -> Result<Buffer<u32>, Box<dyn std::error::Error>> {
    let decoded = image::open(path)?.to_rgba8();
    let (w, h) = decoded.dimensions();
    let mut buf = Buffer::new(w, h);
    for (x, y, px) in decoded.enumerate_pixels() {
        buf.put(x, y, rgba(px[0], px[1], px[2], px[3]));
    }
    Ok(buf)
}

/// Save any image mode as RGBA or gray PNG. Indexed pixels expand through
/// the palette (index 0 transparent), gray saves as 8-bit gray+alpha.
fn save_image(
    img: &Image,
    palette: &Palette,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match img {
        Image::Rgba(buf) => {
            let mut out = image::RgbaImage::new(buf.width(), buf.height());
            for (x, y, px) in out.enumerate_pixels_mut() {
                let c = buf.get(x, y);
                *px = image::Rgba([rgba_r(c), rgba_g(c), rgba_b(c), rgba_a(c)]);
            }
            out.save(path)?;
        }
        Image::GrayAlpha(buf) => {
            let mut out = image::GrayAlphaImage::new(buf.width(), buf.height());
            for (x, y, px) in out.enumerate_pixels_mut() {
                let c = buf.get(x, y);
                *px = image::LumaA([graya_k(c), graya_a(c)]);
            }
            out.save(path)?;
        }
        Image::Indexed(buf) => {
            let mut out = image::RgbaImage::new(buf.width(), buf.height());
            for (x, y, px) in out.enumerate_pixels_mut() {
                let i = buf.get(x, y);
                *px = if i == 0 {
                    image::Rgba([0, 0, 0, 0])
                } else {
                    let (r, g, b) = palette.expand(i);
                    image::Rgba([r, g, b, 255])
                };
            }
            out.save(path)?;
        }
    }
    Ok(())
}
