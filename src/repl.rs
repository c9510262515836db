use crate::runner::{RunOptions, Session};
use std::io::{self, Write};

pub fn start(options: RunOptions) {
    println!("Lento {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    // Persistent across lines: declarations from one input stay visible to the next.
    let mut session = Session::with_options(options);

    loop {
        print!(">> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                match session.eval(line) {
                    Ok(value) if !value.is_nil() => println!("{}", value),
                    Ok(_) => {}
                    Err(error) => {
                        if let Err(io_error) = error.report(line, None) {
                            eprintln!("{}", error);
                            tracing::warn!("could not render diagnostic: {}", io_error);
                        }
                    }
                }
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}
