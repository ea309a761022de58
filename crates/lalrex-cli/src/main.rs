use anyhow::Context as _;
use clap::Parser;
use lalrex::{
    codegen::{Codegen, DEFAULT_TEMPLATE},
    diagnostics::Severity,
    grammar::Grammar,
    pipeline::Config,
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The path of grammar definition file.
    input: PathBuf,

    /// The path of the generated parser. Defaults to the input path with the
    /// extension `.rs`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// A driver template replacing the built-in one.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Write the LALR(1) item sets and the parse table to `<input>.automaton`.
    #[arg(long)]
    dump_automaton: bool,

    /// Write the lexer NFA to `<input>.nfa`.
    #[arg(long)]
    dump_nfa: bool,

    /// Write the lexer DFA before and after minimization to `<input>.dfa`.
    #[arg(long)]
    dump_dfa: bool,

    /// Skip the minimization of the lexer DFA.
    #[arg(long)]
    no_minimize: bool,

    /// Print the table statistics and a diagnostics summary.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let in_file =
        fs::canonicalize(&args.input).context("failed to canonicalize the input file name")?;

    let out_file = args
        .output
        .clone()
        .unwrap_or_else(|| in_file.with_extension("rs"));
    let backup_file = out_file.with_extension("rs.bak");
    let automaton_file = in_file.with_extension("automaton");
    let nfa_file = in_file.with_extension("nfa");
    let dfa_file = in_file.with_extension("dfa");

    let template = match &args.template {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read the template {}", path.display()))?,
        None => DEFAULT_TEMPLATE.to_owned(),
    };

    let grammar = Grammar::from_file(&in_file)
        .with_context(|| format!("failed to load {}", in_file.display()))?;

    let out = Config::new().minimize(!args.no_minimize).generate(&grammar);

    for diagnostic in &out.diagnostics {
        println!("{}", diagnostic);
        if diagnostic.severity() == Severity::Warning {
            let state = diagnostic.state.and_then(|id| {
                out.automaton
                    .as_ref()
                    .and_then(|automaton| automaton.states.get(&id))
            });
            if let Some(state) = state {
                tracing::debug!("{}", state.display(&grammar));
            }
        }
    }

    // dump results, even when the run stopped early.
    if args.dump_automaton {
        let mut dump = String::new();
        if let Some(first_sets) = &out.first_sets {
            dump += &format!("{}\n", first_sets.display(&grammar));
        }
        if let Some(automaton) = &out.automaton {
            dump += &format!("{}\n", automaton.display(&grammar));
        }
        if let Some(table) = &out.table {
            dump += &format!("{}", table.display(&grammar));
        }
        fs::write(&automaton_file, dump).context("writing .automaton")?;
    }
    if args.dump_nfa {
        if let Some(nfa) = &out.nfa {
            fs::write(&nfa_file, nfa.display(&grammar).to_string()).context("writing .nfa")?;
        }
    }
    if args.dump_dfa {
        let mut dump = String::new();
        if let Some(raw_dfa) = &out.raw_dfa {
            dump += &format!("### raw DFA\n{}\n", raw_dfa.display(&grammar));
        }
        if let Some(dfa) = &out.dfa {
            dump += &format!("### minimized DFA\n{}", dfa.display(&grammar));
        }
        fs::write(&dfa_file, dump).context("writing .dfa")?;
    }

    if args.verbose {
        println!(
            "{} warning(s), {} error(s)",
            out.diagnostics.warning_count(),
            out.diagnostics.error_count()
        );
    }

    if !out.is_success() {
        anyhow::bail!(
            "{} error(s), {} warning(s): no parser generated",
            out.diagnostics.error_count(),
            out.diagnostics.warning_count()
        );
    }
    let (Some(table), Some(dfa)) = (&out.table, &out.dfa) else {
        anyhow::bail!("the pipeline finished without a parse table");
    };

    if args.verbose {
        let stats = table.stats();
        println!(
            "\"{}\" produced {} states ({} shifts, {} reductions, {} gotos, {} conflicts), {} lexer states",
            args.input.display(),
            stats.states,
            stats.shifts,
            stats.reduces,
            stats.gotos,
            stats.conflicts,
            dfa.states.len(),
        );
    }

    let codegen = Codegen::new(&grammar, table, dfa);
    let mut generated: Vec<u8> = codegen.render(&template).into();

    // attempt to apply rustfmt to generated code.
    let sh = xshell::Shell::new()?;
    let res = xshell::cmd!(sh, "rustfmt --emit=stdout --color=never --quiet")
        .quiet()
        .stdin(&generated)
        .output();
    if let Ok(output) = res {
        if output.status.success() {
            generated = output.stdout;
        }
    }

    if out_file.exists() {
        fs::copy(&out_file, &backup_file).with_context(|| {
            anyhow::anyhow!(
                "failed to backup the output file to {}",
                backup_file.display()
            )
        })?;
    }
    fs::write(&out_file, &generated).with_context(|| {
        anyhow::anyhow!("failed to write generated parser to {}", out_file.display())
    })?;

    Ok(())
}
