//! Prompt text sent to the summarizer.
//!
//! Bump `PROMPT_VERSION` whenever the instruction text changes so a logged
//! run can be tied to the prompt that produced its summary.

pub const PROMPT_VERSION: &str = "1.0.0";

/// Instructions for the per-developer stakeholder summary (pt-BR).
pub const DEVELOPER_SUMMARY_INSTRUCTIONS: &str = "\
Você receberá estatísticas individuais de desenvolvedores de um projeto. \
Para cada desenvolvedor, gere um resumo separado (em Portugues-BR) contendo:
- Prometido vs. Realizado (se disponível)
- Throughput (quantas issues fechadas)
- O nome dentro de uma [] no relatorio, para destacar
- Quais issues ele abriu ou está responsável
- Observações sobre atividade, papel no projeto ou padrão de contribuição

Aqui estão os dados:

";

/// Build the summarization prompt: instructions followed by the report
/// markdown, verbatim.
pub fn summary_prompt(report_markdown: &str) -> String {
    let mut prompt =
        String::with_capacity(DEVELOPER_SUMMARY_INSTRUCTIONS.len() + report_markdown.len());
    prompt.push_str(DEVELOPER_SUMMARY_INSTRUCTIONS);
    prompt.push_str(report_markdown);
    prompt
}
