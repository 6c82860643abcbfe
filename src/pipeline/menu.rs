//! Menu table: greeting keywords, greeting template, and the token → reply map.
//!
//! The table is data: it is loaded once at startup (JSON file or the built-in
//! default below) and shared read-only by the classifier and the dispatcher.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder replaced by the first token of the contact's display name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Placeholder replaced by the rendered numbered option list.
pub const MENU_PLACEHOLDER: &str = "{menu}";

const DEFAULT_INVALID_OPTION_REPLY: &str = "Opção inválida.";
const DEFAULT_FALLBACK_NAME: &str = "Cliente";

/// One numbered menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    /// Exact text the user sends to pick this option ("1", "2", ...).
    pub token: String,
    /// Line shown in the greeting menu.
    pub label: String,
    /// Canned reply sent when the option is picked.
    pub reply: String,
}

impl MenuOption {
    pub fn new(token: impl Into<String>, label: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
            reply: reply.into(),
        }
    }
}

/// Versioned menu configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Case-insensitive trigger substrings; accents are ignored when matching.
    pub greeting_keywords: Vec<String>,
    /// Greeting text with `{name}` and `{menu}` placeholders.
    pub greeting_template: String,
    /// Ordered option table.
    pub options: Vec<MenuOption>,
    #[serde(default = "default_invalid_option_reply")]
    pub invalid_option_reply: String,
    /// Name used when the transport has no display name for the sender.
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
}

fn default_version() -> u32 {
    1
}

fn default_invalid_option_reply() -> String {
    DEFAULT_INVALID_OPTION_REPLY.to_string()
}

fn default_fallback_name() -> String {
    DEFAULT_FALLBACK_NAME.to_string()
}

impl MenuConfig {
    /// Check the table for mistakes that would make the bot misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.options.is_empty() {
            return Err(invalid("options", "menu must have at least one option"));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            let token = option.token.as_str();
            if token.trim().is_empty() {
                return Err(invalid("options.token", "token must not be blank"));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(invalid(
                    "options.token",
                    &format!("token '{token}' must not contain whitespace"),
                ));
            }
            if !seen.insert(token) {
                return Err(invalid(
                    "options.token",
                    &format!("duplicate token '{token}'"),
                ));
            }
            if option.reply.trim().is_empty() {
                return Err(invalid(
                    "options.reply",
                    &format!("reply for token '{token}' must not be blank"),
                ));
            }
        }

        if self.greeting_template.trim().is_empty() {
            return Err(invalid("greeting_template", "template must not be blank"));
        }
        if self.invalid_option_reply.trim().is_empty() {
            return Err(invalid("invalid_option_reply", "reply must not be blank"));
        }

        Ok(())
    }

    /// Look up a configured option by its exact token.
    pub fn option(&self, token: &str) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.token == token)
    }

    /// Configured tokens in menu order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.token.as_str())
    }

    /// Reply text for a token, or the invalid-option reply when unknown.
    pub fn reply_for(&self, token: &str) -> &str {
        self.option(token)
            .map(|o| o.reply.as_str())
            .unwrap_or(&self.invalid_option_reply)
    }

    /// The numbered option list, one `"<token> - <label>"` line per option.
    pub fn render_menu(&self) -> String {
        self.options
            .iter()
            .map(|o| format!("{} - {}", o.token, o.label))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full greeting for a contact.
    pub fn render_greeting(&self, display_name: &str) -> String {
        self.greeting_template
            .replace(NAME_PLACEHOLDER, first_name(display_name))
            .replace(MENU_PLACEHOLDER, &self.render_menu())
    }
}

/// First whitespace-separated token of a display name.
pub fn first_name(display_name: &str) -> &str {
    display_name.split_whitespace().next().unwrap_or(display_name)
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        const SIGNUP: &str = "Link para cadastro: https://sites.google.com/view/solucoes-em-ia";
        const CONTACT: &str = "WhatsApp (12) 99.750.7961.";

        Self {
            version: default_version(),
            greeting_keywords: ["menu", "oi", "ola", "dia", "tarde", "noite"]
                .into_iter()
                .map(String::from)
                .collect(),
            greeting_template: "Olá! {name}, sou o assistente virtual da empresa DeBocaOnBoca. \
                Como posso ajudá-lo(a) hoje? Não deixe de visitar e se inscrever em nosso Canal \
                Youtube ( https://www.youtube.com/@debocaemboca2024/videos?sub_confirmation=l ) \
                e seguir nosso Instagram ( https://www.instagram.com/debocaemboca2024/ ) \
                Por favor, digite o *número* da opção desejada:\n\n{menu}"
                .to_string(),
            options: vec![
                MenuOption::new(
                    "1",
                    "Ter um(a) Assistente Virtual Humanizado igual a este, atende clientes e \
                     qualifica LEADS com captação a partir de R$ 900,00 ou aprender a fazer um \
                     com templates e arquivos de configurações prontos",
                    format!(
                        "{SIGNUP}\n\nReceba o passo a passo, templates e arquivos de \
                         configuração, damos suporte na instalação via remoto através do \
                         AnyDesk *Pagamento:* A partir de R$ 500,00 à vista MercadoPago Pix \
                         E-mail vendamais@gmail.com ou com cartão."
                    ),
                ),
                MenuOption::new(
                    "2",
                    "Tenha 3 consultas mensais (assinatura mensal) que vão otimizar seu negócio \
                     usando Soluções com Inteligência Artificial,\n Em diversas áreas\n Em \
                     CiberSegurança Famíliar, pequenas e Médias Empresas\n Em Marketing \
                     Digital\n Em Desenvolvimento de Aplicativos Mobile",
                    format!(
                        "{SIGNUP}\n\nTenha 3 consultas mensais que vão otimizar seu negócio nas \
                         Soluções em IA e suporte via remoto através do AnyDesk *Assinatura \
                         Mensal:* R$ 99,90 à vista MercadoPago Pix E-mail vendamais@gmail.com \
                         pode pagar com cartão."
                    ),
                ),
                MenuOption::new(
                    "3",
                    "Ser nosso sócio(a) parceiro(a) ganhos significativos em conta de participação",
                    "Informações ao final na página e Link para cadastro: \
                     https://sites.google.com/view/solucoes-em-ia",
                ),
                MenuOption::new(
                    "4",
                    "Economia de até 15% mensalmente e gratuitamente na sua conta de luz",
                    "DeBocaOnBoca Energia Solar: https://debocaembocaenergiasolar.vendasmais.com/",
                ),
                MenuOption::new(
                    "5",
                    "Dossiê Pequeno; Médio ou Completo sobre quem lhe prejudicou, deu golpe ou \
                     quem você desconfia ou assinatura mensal R$ 150,00, com direito a 3 \
                     consultas mensais - Cada consulta adicional, R$ 100,00",
                    format!(
                        "{SIGNUP}\n\nSaiba, antes que seja tarde, com quem se relaciona, quem \
                         lhe deu um golpe ou de quem você desconfia, a partir de qualquer \
                         pequena informação ou detalhe, cpf, nome completo, endereço, cep, \
                         placa de carro e outros.\nPequeno Dossiê R$ 75,00.\nMédio Dossiê \
                         R$ 150;00.\nCompleto Dossiê R$ 300,00.\n Assinatura Mensal R$ 150,00, \
                         com direito a 3 consultas mensais - Cada consulta adicional, \
                         R$ 100,00\nPix MercadoPago E-mail vendamais@gmail.com.\n{CONTACT}"
                    ),
                ),
                MenuOption::new(
                    "6",
                    "Quer Renda Extra - Repeteco você vai se apaixonar",
                    "Link para cadastro: https://sites.google.com/view/debocaonboca-repeteco",
                ),
                MenuOption::new(
                    "7",
                    "Backup completo do seu celular antes que seja tarde",
                    format!("Serviço presencial, agendar entre em contato: {CONTACT}"),
                ),
                MenuOption::new(
                    "8",
                    "Quer uma divulgação personalizada como esta, entre em contato",
                    format!("Entre em contato: {CONTACT}"),
                ),
                MenuOption::new(
                    "9",
                    "Outras perguntas",
                    "Se tiver outras dúvidas ou precisar de mais informações, por favor, \
                     escreva aqui ou visite nosso site: https://sites.google.com/view/solucoes-em-ia/",
                ),
            ],
            invalid_option_reply: default_invalid_option_reply(),
            fallback_name: default_fallback_name(),
        }
    }
}
