use colored::Colorize;

pub fn handle_command(input: &str) -> Result<(), String> {
    match input {
        "help" => {
            println!("\n📖 Study Assistant Commands:");
            println!("  Just type a question. With notes loaded it is answered from them,");
            println!("  otherwise the concept is explained from scratch.");
            println!();

            println!("📄 Notes:");
            println!("  upload <file.pdf>   - Load lecture notes from a PDF");
            println!("  doc info            - Show the loaded notes");
            println!("  doc list            - List uploaded documents");
            println!();

            println!("🎓 Study Actions:");
            println!("  explain <question>                - Explain a concept");
            println!("  summarize                         - Summarize the loaded notes");
            println!("  quiz [n] [easy|medium|hard] [text] - Generate n MCQs (default 5, medium)");
            println!("  ask <question>                    - Chat with your notes");
            println!("  Example: quiz 3 hard, quiz 5 The French Revolution");
            println!();

            println!("🗂️ History:");
            println!("  history [explain|rag]   - Show chat history");
            println!("  outputs [summary|quiz]  - Show generated summaries and quizzes");
            println!();

            println!("⚙️ System Commands:");
            println!("  status - Check the model server and vector store");
            println!("  help   - Show this help menu");
            println!("  exit   - Exit the program");
            println!();
            Ok(())
        }
        "exit" | "quit" => {
            println!("{}", "👋 Goodbye, happy studying!".bright_green());
            std::process::exit(0);
        }
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string()),
    }
}
