//! Prints a summary of the chunks around the origin of a world.
//!
//! ```text
//! world-dump anvil   <world path> [radius]
//! world-dump bedrock <world path> [radius]
//! ```

use std::process::ExitCode;

use strata_anvil::RegionFlavor;
use strata_datatypes::Dimension;
use strata_world::{WorldBackend, WorldStore, open_anvil_world, open_bedrock_world};


fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (format, path, radius) = match args.as_slice() {
        [format, path] => (format.as_str(), path.as_str(), 2_i32),
        [format, path, radius] => match radius.parse() {
            Ok(radius) => (format.as_str(), path.as_str(), radius),
            Err(_) => return usage(),
        },
        _ => return usage(),
    };

    let outcome = match format {
        "anvil" => {
            let store = open_anvil_world(path, Dimension::OverWorld, RegionFlavor::Anvil, None);
            dump(&store, radius)
        }
        "bedrock" => match open_bedrock_world(path, Dimension::OverWorld, false) {
            Ok(store) => dump(&store, radius),
            Err(err) => Err(err),
        },
        _ => return usage(),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("world-dump: {err}");
            ExitCode::FAILURE
        }
    }
}

fn usage() -> ExitCode {
    eprintln!("usage: world-dump <anvil|bedrock> <world path> [radius]");
    ExitCode::FAILURE
}

fn dump<B: WorldBackend>(
    store:  &WorldStore<B>,
    radius: i32,
) -> Result<(), strata_world::WorldError> {
    let properties = store.properties();
    println!(
        "world {:?}, game type {:?}, spawn {:?}",
        properties.level_name(),
        properties.game_type(),
        properties.spawn(),
    );

    let mut generated = 0_u32;
    for cz in -radius..=radius {
        for cx in -radius..=radius {
            if !store.has_generated(cx, cz)? {
                continue;
            }
            generated += 1;

            let chunk = store.chunk(cx, cz, false)?;
            let chunk = chunk.lock().expect("no other user of this chunk");

            let subchunks = chunk.subchunks().count();
            let entities = chunk.entities().len();
            println!(
                "chunk ({cx:3}, {cz:3}): {subchunks:2} subchunks, \
                 {entities:3} entities, finalization {:?}",
                chunk.finalization(),
            );
        }
    }

    println!(
        "{generated} generated chunks within radius {radius} ({} loaded)",
        store.loaded_chunks().len(),
    );
    Ok(())
}
