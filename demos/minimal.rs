use rawline::Editor;

/// Minimal REPL
fn main() -> rawline::Result<()> {
    env_logger::init();
    let mut editor = Editor::new("> ");
    loop {
        let line = editor.read_line()?; // read
        if line == "quit" {
            break;
        }
        println!("Line: {line}"); // eval / print
    } // loop
    Ok(())
}
