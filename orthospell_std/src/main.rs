// The command line front end: checks files or standard input and
// reports misspelled words, list style or pipe style.

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

use orthospell_std::{
    apply_conf_string, new_config, new_document_checker, new_speller, SpellerHandle,
    PROGRAM_VERSION,
};

struct ArgTokens {
    agt_args: Vec<String>,
    agt_current_ix: usize,
}

impl ArgTokens {
    fn new(args: Vec<String>) -> ArgTokens {
        ArgTokens {
            agt_args: args,
            agt_current_ix: 1, // the process name is skipped
        }
    }

    fn get_next_arg(&mut self) -> Option<String> {
        let arg = self.agt_args.get(self.agt_current_ix).cloned();
        if arg.is_some() {
            self.agt_current_ix += 1;
        }
        arg
    }

    fn get_arg_option(&mut self, option: &str) -> Option<String> {
        match self.get_next_arg() {
            Some(value) => Some(value),
            None => {
                eprintln!("Missing value for argument: {}", option);
                None
            }
        }
    }
}

#[derive(PartialEq)]
enum RunMode {
    ListMode,
    PipeMode,
}

fn check_lines(
    handle: &SpellerHandle,
    reader: &mut dyn BufRead,
    mode: &RunMode,
) -> io::Result<()> {
    let mut checker = match new_document_checker(handle) {
        Ok(checker) => checker,
        Err(err) => {
            eprintln!("Error: {}", err);
            return Ok(());
        }
    };
    for line in reader.lines() {
        let line = line?;
        checker.reset();
        checker.process(line.as_bytes(), 0, 1);
        match mode {
            RunMode::ListMode => {
                while let Some(token) = checker.next_misspelling(handle.speller()) {
                    println!("{}", token.ctk_word);
                }
            }
            RunMode::PipeMode => {
                while let Some(token) = checker.next() {
                    if handle.speller().check_word_bytes(&token.ctk_word_bytes) {
                        println!("*");
                        continue;
                    }
                    let suggestions = handle.suggest(&token.ctk_word);
                    if suggestions.is_empty() {
                        println!("# {} {}", token.ctk_word, token.ctk_begin);
                    } else {
                        println!(
                            "& {} {} {}: {}",
                            token.ctk_word,
                            suggestions.len(),
                            token.ctk_begin,
                            suggestions.join(", ")
                        );
                    }
                }
                println!();
            }
        }
    }
    Ok(())
}

fn usage() {
    eprintln!("Usage: orthospell [options] [files...]");
    eprintln!("  -d <code>        use the dictionary for this language code");
    eprintln!("  -l               list misspelled words (default)");
    eprintln!("  -a               pipe mode, one result line per word");
    eprintln!("  --conf <k=v;..>  apply configuration overrides");
    eprintln!("  --dict-dir <dir> add a dictionary directory");
    eprintln!("  -v               show the version");
}

fn run(args: Vec<String>) -> ExitCode {
    let mut arg_tokens = ArgTokens::new(args);
    let mut config = new_config();
    let mut mode = RunMode::ListMode;
    let mut files: Vec<String> = Vec::new();
    let mut options_finished = false;
    while let Some(arg) = arg_tokens.get_next_arg() {
        if options_finished || !arg.starts_with('-') {
            files.push(arg);
        } else if arg == "-d" {
            if let Some(value) = arg_tokens.get_arg_option("-d") {
                let _ = config.replace("lang", &value);
                let _ = config.replace("master", &value);
            } else {
                usage();
                return ExitCode::from(1);
            }
        } else if arg == "-l" {
            mode = RunMode::ListMode;
        } else if arg == "-a" {
            mode = RunMode::PipeMode;
        } else if arg == "--conf" {
            if let Some(value) = arg_tokens.get_arg_option("--conf") {
                apply_conf_string(&mut config, &value);
            } else {
                usage();
                return ExitCode::from(1);
            }
        } else if arg == "--dict-dir" {
            if let Some(value) = arg_tokens.get_arg_option("--dict-dir") {
                let _ = config.replace("dict-dir", &value);
            } else {
                usage();
                return ExitCode::from(1);
            }
        } else if arg == "-v" || arg == "--version" {
            println!("orthospell {}", PROGRAM_VERSION);
            return ExitCode::SUCCESS;
        } else if arg == "--" {
            options_finished = true;
        } else {
            eprintln!("Unknown option: {}", arg);
            usage();
            return ExitCode::from(1);
        }
    }

    let handle = match new_speller(config) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(2);
        }
    };

    if mode == RunMode::PipeMode {
        println!("@(#) orthospell {}", PROGRAM_VERSION);
    }

    let result = if files.is_empty() {
        let stdin = io::stdin();
        let mut reader = stdin.lock();
        check_lines(&handle, &mut reader, &mode)
    } else {
        let mut result = Ok(());
        for name in &files {
            match File::open(name) {
                Ok(file) => {
                    let mut reader = BufReader::new(file);
                    result = check_lines(&handle, &mut reader, &mode);
                }
                Err(_) => {
                    eprintln!("Error: The file \"{}\" can not be opened for reading.", name);
                }
            }
        }
        result
    };
    if let Err(err) = result {
        eprintln!("Error: {}", err);
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    env_logger::init();
    run(env::args().collect())
}
