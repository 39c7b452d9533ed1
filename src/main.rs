//! Dice Tray - headless command-line roller
//!
//! Usage: `dice-tray [--seed N] [--settings FILE] [--quick] <notation>...`
//!
//! Throws the dice on the reference table and prints the settled values.
//! Forced results (`2d6@3,4`) land exactly as requested.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(message) = native::run(std::env::args().skip(1).collect()) {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Web hosts drive `Tray` from their own frame loop
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::RefCell;
    use std::rc::Rc;

    use dice_tray::quick_roll::roll_notation;
    use dice_tray::sim::{RollOutcome, TableWorld, Tray};
    use dice_tray::{Gesture, Notation, Settings};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    struct Args {
        seed: u64,
        settings: Option<String>,
        quick: bool,
        notation: String,
    }

    fn parse_args(args: Vec<String>) -> Result<Args, String> {
        let mut parsed = Args {
            seed: 0,
            settings: None,
            quick: false,
            notation: String::new(),
        };
        let mut seed = None;
        let mut words = Vec::new();
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--seed" => {
                    let value = iter.next().ok_or("--seed needs a value")?;
                    seed = Some(value.parse().map_err(|_| format!("bad seed {:?}", value))?);
                }
                "--settings" => {
                    parsed.settings = Some(iter.next().ok_or("--settings needs a path")?);
                }
                "--quick" => parsed.quick = true,
                _ => words.push(arg),
            }
        }
        parsed.seed = seed.unwrap_or_else(rand::random);
        parsed.notation = words.join(" ");
        Ok(parsed)
    }

    pub fn run(args: Vec<String>) -> Result<(), String> {
        let args = parse_args(args)?;
        let settings = match &args.settings {
            Some(path) => Settings::load(path).map_err(|e| e.to_string())?,
            None => Settings::default(),
        };

        let notation = Notation::parse(&args.notation);
        for term in notation.errors() {
            if let Some(err) = term.error {
                println!("  skipped {:?}: {}", term.original, err);
            }
        }
        if notation.is_empty() {
            return Err(format!("nothing to roll in {:?}", args.notation));
        }

        log::info!("Dice Tray starting (seed {})", args.seed);
        let mut rng = Pcg32::seed_from_u64(args.seed);

        if args.quick {
            let rolls = roll_notation(&mut rng, &notation);
            println!("{} => {:?} total {}", notation, rolls, notation.total(&rolls));
            return Ok(());
        }

        let gesture = Gesture::random(&mut rng, &settings);
        let mut tray = Tray::new(TableWorld::new(&settings), settings.clone());
        let outcome: Rc<RefCell<Option<RollOutcome>>> = Rc::default();
        let sink = outcome.clone();

        let token = tray
            .throw(&notation, &gesture, &mut rng, move |o| *sink.borrow_mut() = Some(o))
            .map_err(|e| e.to_string())?
            .ok_or("no dice to throw")?;
        tray.run_to_completion(token, settings.fixed_step)
            .map_err(|e| e.to_string())?;

        let Some(outcome) = outcome.borrow_mut().take() else {
            return Err("roll was cancelled".into());
        };
        println!("{} => {:?} total {}", outcome.notation, outcome.values, outcome.total);
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_args() {
            let words = ["--seed", "7", "2d6", "+", "d20"];
            let args = parse_args(words.iter().map(|w| w.to_string()).collect());
            let Ok(args) = args else {
                panic!("args should parse");
            };
            assert_eq!(args.seed, 7);
            assert_eq!(args.notation, "2d6 + d20");
            assert!(!args.quick);
        }

        #[test]
        fn test_bad_seed() {
            assert!(parse_args(vec!["--seed".into(), "x".into()]).is_err());
        }
    }
}
