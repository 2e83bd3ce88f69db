/// Starter `.weave.toml` written by `weave --init`.
///
/// It threads a per-account `client` through a Go send service: each `Send*`
/// method looks its client up on entry, and the helpers it calls receive that
/// client instead of reaching for the global one.
pub fn generate_init_template() -> String {
	INIT_TEMPLATE.to_string()
}

const INIT_TEMPLATE: &str = r#"# weave configuration
#
# Rules run top to bottom; `after` makes an ordering requirement explicit.
# Templates match token by token, so spacing differences are ignored.
#   ${name}            one identifier (glue it to text: domainSend.${kind}Request)
#   ${name:text}       balanced free text up to the next literal
#   ${name:"literal"}  a fixed token sequence

# Stop looking for .weave.toml files in parent directories.
root = true

# File to rewrite, relative to this file.
target = "src/usecase/send.go"

# Printed after a successful rewrite.
verify-hint = "go build ./..."

# Inject a client lookup at the top of each Send* method, before validation.
# SendText is expected to have one already.
[[rules]]
name = "SendImage"
kind = "inject"
signature = 'func (service serviceSend) SendImage(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendFile"
kind = "inject"
signature = 'func (service serviceSend) SendFile(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendVideo"
kind = "inject"
signature = 'func (service serviceSend) SendVideo(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendContact"
kind = "inject"
signature = 'func (service serviceSend) SendContact(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendLink"
kind = "inject"
signature = 'func (service serviceSend) SendLink(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendLocation"
kind = "inject"
signature = 'func (service serviceSend) SendLocation(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendAudio"
kind = "inject"
signature = 'func (service serviceSend) SendAudio(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendPoll"
kind = "inject"
signature = 'func (service serviceSend) SendPoll(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

# Presence requests carry the account directly.
[[rules]]
name = "SendPresence"
kind = "inject"
signature = 'func (service serviceSend) SendPresence(ctx context.Context, request domainSend.PresenceRequest) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendChatPresence"
kind = "inject"
signature = 'func (service serviceSend) SendChatPresence(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

[[rules]]
name = "SendSticker"
kind = "inject"
signature = 'func (service serviceSend) SendSticker(ctx context.Context, request domainSend.${kind}Request) (response domainSend.GenericResponse, err error) {'
anchor = 'err = validations.'
body = [
    "// Get client for account",
    "client, err := service.getClient(request.BaseRequest.AccountID)",
    "if err != nil {",
    "\treturn response, err",
    "}",
    "",
]

# getMentionFromText takes the client as a parameter.
[[rules]]
name = "getMentionFromText signature"
kind = "rewrite"
pattern = 'func (service serviceSend) getMentionFromText(_ context.Context, messages string) (result []string) {'
replacement = 'func (service serviceSend) getMentionFromText(_ context.Context, client *whatsmeow.Client, messages string) (result []string) {'

# Call sites: every matching call in the file is rewritten, so these run
# once every function that uses `client` has it in scope.
[[rules]]
name = "getMentionFromText calls"
kind = "insert-arg"
callee = "service.getMentionFromText"
leading = ["ctx"]
arg = "client"
after = ["getMentionFromText signature"]

[[rules]]
name = "ValidateJidWithLogin"
kind = "replace-arg"
callee = "utils.ValidateJidWithLogin"
index = 0
from = "whatsapp.GetClient()"
to = "client"
after = [
    "SendImage",
    "SendFile",
    "SendVideo",
    "SendContact",
    "SendLink",
    "SendLocation",
    "SendAudio",
    "SendPoll",
    "SendPresence",
    "SendChatPresence",
    "SendSticker",
    "getMentionFromText signature",
]

[[rules]]
name = "uploadMedia"
kind = "insert-arg"
callee = "service.uploadMedia"
leading = ["ctx"]
arg = "client"
after = [
    "SendImage",
    "SendFile",
    "SendVideo",
    "SendAudio",
    "SendSticker",
]

[[rules]]
name = "wrapSendMessage"
kind = "insert-arg"
callee = "service.wrapSendMessage"
leading = ["ctx"]
arg = "client"
after = [
    "SendImage",
    "SendFile",
    "SendVideo",
    "SendContact",
    "SendLink",
    "SendLocation",
    "SendAudio",
    "SendPoll",
    "SendPresence",
    "SendChatPresence",
    "SendSticker",
]

# Calls made directly on the global client.
[[rules]]
name = "BuildPollCreation receiver"
kind = "rewrite"
substitution = 's|whatsapp.GetClient().BuildPollCreation(|client.BuildPollCreation(|g'
after = ["SendPoll"]

[[rules]]
name = "SendPresence receiver"
kind = "rewrite"
substitution = 's|whatsapp.GetClient().SendPresence(ctx|client.SendPresence(ctx|g'
after = ["SendPresence"]

[[rules]]
name = "SendChatPresence receiver"
kind = "rewrite"
substitution = 's|whatsapp.GetClient().SendChatPresence(ctx|client.SendChatPresence(ctx|g'
after = ["SendChatPresence"]
"#;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::cascade::merge_configs;
	use crate::config::parser::parse_config_str;
	use crate::config::types::LoadedConfig;
	use crate::rules::compile_rules;
	use std::path::PathBuf;

	#[test]
	fn test_init_template_parses_and_compiles() {
		let path = PathBuf::from("/project/.weave.toml");
		let config = parse_config_str(&generate_init_template(), &path).unwrap();
		assert!(config.root);

		let merged = merge_configs(&[LoadedConfig { config, path }]);
		assert_eq!(
			merged.target,
			Some(PathBuf::from("/project/src/usecase/send.go"))
		);

		let registry = compile_rules(&merged).unwrap();
		assert_eq!(registry.len(), 19);
		assert_eq!(
			registry.dependencies_of("getMentionFromText calls"),
			Some(&["getMentionFromText signature".to_string()][..])
		);
		let wrap = registry.dependencies_of("wrapSendMessage").unwrap();
		assert_eq!(wrap.len(), 11);
		assert!(wrap.contains(&"SendChatPresence".to_string()));
	}

	const SEND_SERVICE: &str = r#"package usecase

func (service serviceSend) SendImage(ctx context.Context, request domainSend.ImageRequest) (response domainSend.GenericResponse, err error) {
	err = validations.ValidateSendImage(ctx, request)
	if err != nil {
		return response, err
	}
	dataWaRecipient, err := utils.ValidateJidWithLogin(whatsapp.GetClient(), request.BaseRequest.Phone)
	if err != nil {
		return response, err
	}
	uploaded, err := service.uploadMedia(ctx, whatsmeow.MediaImage, request.Image, dataWaRecipient)
	mentions := service.getMentionFromText(ctx, request.Caption)
	ts, err := service.wrapSendMessage(ctx, dataWaRecipient, uploaded, mentions)
	return response, err
}

func (service serviceSend) SendPoll(ctx context.Context, request domainSend.PollRequest) (response domainSend.GenericResponse, err error) {
	err = validations.ValidateSendPoll(ctx, request)
	if err != nil {
		return response, err
	}
	dataWaRecipient, err := utils.ValidateJidWithLogin(whatsapp.GetClient(), request.BaseRequest.Phone)
	content := whatsapp.GetClient().BuildPollCreation(request.Question, request.Options, request.MaxAnswer)
	ts, err := service.wrapSendMessage(ctx, dataWaRecipient, content, "")
	return response, err
}

func (service serviceSend) SendPresence(ctx context.Context, request domainSend.PresenceRequest) (response domainSend.GenericResponse, err error) {
	err = validations.ValidateSendPresence(ctx, request)
	if err != nil {
		return response, err
	}
	err = whatsapp.GetClient().SendPresence(ctx, types.Presence(request.Type))
	return response, err
}

func (service serviceSend) SendChatPresence(ctx context.Context, request domainSend.ChatPresenceRequest) (response domainSend.GenericResponse, err error) {
	err = validations.ValidateSendChatPresence(ctx, request)
	if err != nil {
		return response, err
	}
	userJid, err := utils.ValidateJidWithLogin(whatsapp.GetClient(), request.BaseRequest.Phone)
	err = whatsapp.GetClient().SendChatPresence(ctx, userJid, types.ChatPresence(request.Action), types.ChatPresenceMediaText)
	return response, err
}

func (service serviceSend) getMentionFromText(_ context.Context, messages string) (result []string) {
	for _, mention := range utils.ContainsMention(messages) {
		if dataWaRecipient, err := utils.ValidateJidWithLogin(whatsapp.GetClient(), mention); err == nil {
			result = append(result, dataWaRecipient.String())
		}
	}
	return result
}
"#;

	#[test]
	fn test_init_template_threads_client_through_every_method() {
		let path = PathBuf::from("/project/.weave.toml");
		let config = parse_config_str(&generate_init_template(), &path).unwrap();
		let registry = compile_rules(&merge_configs(&[LoadedConfig { config, path }])).unwrap();

		let mut buffer = SEND_SERVICE.to_string();
		let outcomes = crate::driver::apply(&registry, &mut buffer);
		assert!(outcomes.iter().all(|o| o.warnings.is_empty()), "{outcomes:?}");
		assert!(!buffer.contains("whatsapp.GetClient()"), "{buffer}");

		for function in buffer.split("\nfunc ").skip(1) {
			if function.starts_with("(service serviceSend) getMentionFromText(") {
				assert!(function.contains("getMentionFromText(_ context.Context, client *whatsmeow.Client, messages string)"));
				continue;
			}
			assert!(function.contains("client."), "{function}");
			assert!(function.contains("client, err := service.getClient(request."), "{function}");
		}
		assert!(buffer.contains("client, err := service.getClient(request.AccountID)"));
		assert!(buffer.contains("client.BuildPollCreation(request.Question"));
		assert!(buffer.contains("client.SendChatPresence(ctx, userJid"));
		assert!(buffer.contains("service.getMentionFromText(ctx, client, request.Caption)"));
		assert!(buffer.contains("service.uploadMedia(ctx, client, whatsmeow.MediaImage"));

		let rewritten = buffer.clone();
		let outcomes = crate::driver::apply(&registry, &mut buffer);
		assert!(outcomes.iter().all(|o| !o.applied()), "{outcomes:?}");
		assert_eq!(buffer, rewritten);
	}
}
